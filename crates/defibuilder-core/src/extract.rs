//! Pulls contract source out of free-form model output.
//!
//! Models are asked for code only but routinely wrap it in a markdown fence,
//! sometimes with a sentence of preamble. The first ```` ```solidity ```` block
//! wins; anything without such a block is assumed to already be bare source.

use std::sync::LazyLock;

use regex::Regex;

static SOLIDITY_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```solidity([\s\S]*?)```").expect("static regex"));

/// Return the trimmed body of the first `solidity` fenced block, or `text`
/// unchanged when there is none.
pub fn extract_code(text: &str) -> String {
    match SOLIDITY_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().trim().to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_block_returns_trimmed_body() {
        let text = "Here you go:\n```solidity\n  pragma solidity 0.8.19;\ncontract A {}\n\n```\nEnjoy.";
        assert_eq!(extract_code(text), "pragma solidity 0.8.19;\ncontract A {}");
    }

    #[test]
    fn no_fence_passes_through() {
        let text = "  pragma solidity 0.8.19;\ncontract A {}  \n";
        assert_eq!(extract_code(text), text);
    }

    #[test]
    fn untagged_fence_passes_through() {
        let text = "```\ncontract A {}\n```";
        assert_eq!(extract_code(text), text);
    }

    #[test]
    fn unclosed_fence_passes_through() {
        let text = "```solidity\ncontract A {}";
        assert_eq!(extract_code(text), text);
    }

    #[test]
    fn first_of_several_blocks_wins() {
        let text = "```solidity\ncontract A {}\n```\nand\n```solidity\ncontract B {}\n```";
        assert_eq!(extract_code(text), "contract A {}");
    }

    #[test]
    fn empty_input() {
        assert_eq!(extract_code(""), "");
    }

    #[test]
    fn idempotent() {
        let inputs = [
            "```solidity\ncontract A {}\n```",
            "contract A {}",
            "prose\n```solidity\n\n  contract A { uint x; }\n```\nmore prose",
            "",
            "```solidity```",
        ];
        for input in inputs {
            let once = extract_code(input);
            assert_eq!(extract_code(&once), once, "not idempotent for {input:?}");
        }
    }
}
