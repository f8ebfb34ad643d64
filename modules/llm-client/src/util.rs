/// Strip markdown code fences from a completion reply.
/// Models wrap JSON payloads in ```json fences despite instructions.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
    }

    #[test]
    fn strips_bare_fence() {
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
    }

    #[test]
    fn unfenced_input_unchanged() {
        assert_eq!(strip_code_blocks("  {}  "), "{}");
    }
}
