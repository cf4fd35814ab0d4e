//! Prompt templates for answering, summarizing and chatting.

use super::types::SearchResult;

/// Shortens `text` to at most `limit` characters, never splitting a character.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Joins retrieved chunks into a context block, tagging each with its 1-based
/// fragment number.
///
/// Fragments are added in rank order until `char_budget` would be exceeded.
/// The best fragment is always kept, cut down to the budget if necessary.
/// Returns the block and the number of fragments it holds.
pub fn build_context(results: &[SearchResult], char_budget: usize) -> (String, usize) {
    let mut context = String::new();
    let mut used_chars = 0;
    let mut used = 0;

    for (i, result) in results.iter().enumerate() {
        let fragment = format!("[Fragment {}]\n{}", i + 1, result.chunk.text);
        let len = fragment.chars().count() + if used == 0 { 0 } else { 2 };

        if used_chars + len > char_budget {
            if used == 0 {
                context.push_str(truncate_chars(&fragment, char_budget));
                used = 1;
            }
            break;
        }

        if used > 0 {
            context.push_str("\n\n");
        }
        context.push_str(&fragment);
        used_chars += len;
        used += 1;
    }

    (context, used)
}

pub fn answer(context: &str, question: &str) -> String {
    format!(
        "You are an assistant answering questions about a document.\n\
         Answer strictly from the context below. If the context does not contain \
         the information needed, say explicitly that the document does not provide \
         it instead of guessing. Cite fragments by their number when useful.\n\n\
         Context:\n{context}\n\n\
         Question: {question}\n\n\
         Answer:"
    )
}

pub fn summarize_document(content: &str) -> String {
    format!(
        "Write a structured summary of the following document.\n\
         Use three sections:\n\
         1. Main topic\n\
         2. Key points\n\
         3. Conclusions\n\n\
         Document:\n{content}\n\n\
         Summary:"
    )
}

pub fn summarize_text(text: &str) -> String {
    format!(
        "Summarize the following text in 3 to 5 sentences, keeping only the \
         essential information.\n\n\
         Text:\n{text}\n\n\
         Summary:"
    )
}

/// Chat prompt from the system instructions, prior turns and the new message.
///
/// `history` holds `(input, output)` pairs, oldest first, already windowed.
pub fn chat(system_prompt: &str, history: &[(String, String)], message: &str) -> String {
    let mut prompt = String::from(system_prompt.trim());
    prompt.push_str("\n\n");

    if !history.is_empty() {
        prompt.push_str("Conversation so far:\n");
        for (input, output) in history {
            prompt.push_str(&format!("User: {input}\nAssistant: {output}\n"));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!("User: {message}\nAssistant:"));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::Chunk;

    fn result(text: &str) -> SearchResult {
        SearchResult {
            id: 0,
            chunk: Chunk::new(text),
            score: 1.0,
        }
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_context_tags_fragments() {
        let (context, used) = build_context(&[result("first"), result("second")], 1000);
        assert_eq!(used, 2);
        assert_eq!(context, "[Fragment 1]\nfirst\n\n[Fragment 2]\nsecond");
    }

    #[test]
    fn test_context_respects_budget() {
        let results = [result(&"a".repeat(30)), result(&"b".repeat(30))];
        let (context, used) = build_context(&results, 50);
        assert_eq!(used, 1);
        assert!(!context.contains('b'));

        let (context, used) = build_context(&results, 10);
        assert_eq!(used, 1);
        assert_eq!(context.chars().count(), 10);
    }

    #[test]
    fn test_answer_prompt_demands_grounding() {
        let prompt = answer("[Fragment 1]\nfacts", "what?");
        assert!(prompt.contains("strictly from the context"));
        assert!(prompt.contains("[Fragment 1]\nfacts"));
        assert!(prompt.ends_with("Question: what?\n\nAnswer:"));
    }

    #[test]
    fn test_chat_prompt_lists_history() {
        let history = vec![("hi".to_string(), "hello".to_string())];
        let prompt = chat("Be brief.", &history, "how are you?");
        assert!(prompt.starts_with("Be brief.\n\n"));
        assert!(prompt.contains("User: hi\nAssistant: hello\n"));
        assert!(prompt.ends_with("User: how are you?\nAssistant:"));
    }
}
