//! Local punctuation post-processing for raw transcripts.
//!
//! ASR output frequently stutters punctuation ("好的，，，。。") when the
//! punctuation model re-fires across segment boundaries.  Before any LLM
//! cleanup, runs of two or more marks — any mix of Chinese and Latin — are
//! collapsed to the run's **last** mark.

/// Punctuation marks that participate in run collapsing.
const COLLAPSIBLE: &[char] = &[
    '，', '。', '！', '？', '、', '；', '：', ',', '.', '!', '?', ';', ':',
];

fn is_collapsible(c: char) -> bool {
    COLLAPSIBLE.contains(&c)
}

/// Collapse every run of 2+ punctuation marks to the run's last mark.
///
/// Single marks pass through unchanged, so the function is idempotent:
/// applying it twice yields the same result as applying it once.
///
/// # Examples
///
/// ```
/// use voicekey::cleanup::collapse_punctuation;
///
/// assert_eq!(collapse_punctuation("好的，，，。。谢谢！！"), "好的。谢谢！");
/// assert_eq!(collapse_punctuation("你好。"), "你好。");
/// ```
pub fn collapse_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run_last: Option<char> = None;

    for ch in text.chars() {
        if is_collapsible(ch) {
            run_last = Some(ch);
        } else {
            if let Some(mark) = run_last.take() {
                out.push(mark);
            }
            out.push(ch);
        }
    }
    if let Some(mark) = run_last {
        out.push(mark);
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
