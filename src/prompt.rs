use crate::host::PromptContext;

pub const AFTER_CURSOR_SEPARATOR: &str = "\n\nAFTER CURSOR:\n";

#[derive(Debug, Clone, Copy, Default)]
pub struct PromptOptions {
    /// Change mode. A selection is always the prompt when present; this only
    /// decides whether it is deleted from the buffer before streaming.
    pub use_visual_selection: bool,
    pub include_after_cursor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    pub prompt: String,

    /// The selection was used and must be removed before streaming starts.
    pub delete_selection: bool,
}

pub fn assemble(ctx: &PromptContext, opts: PromptOptions) -> Assembled {
    let (mut prompt, from_selection) = match &ctx.visual_selection {
        Some(sel) => (sel.clone(), true),
        None => (ctx.before_cursor.clone(), false),
    };

    if opts.include_after_cursor {
        prompt.push_str(AFTER_CURSOR_SEPARATOR);
        prompt.push_str(&ctx.after_cursor);
    }

    Assembled {
        prompt,
        delete_selection: from_selection && opts.use_visual_selection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(selection: Option<&str>) -> PromptContext {
        PromptContext {
            before_cursor: "fn main() {\n".to_string(),
            after_cursor: "}\n".to_string(),
            visual_selection: selection.map(str::to_string),
        }
    }

    #[test]
    fn uses_text_before_cursor_without_selection() {
        let out = assemble(&ctx(None), PromptOptions::default());
        assert_eq!(out.prompt, "fn main() {\n");
        assert!(!out.delete_selection);
    }

    #[test]
    fn selection_replaces_before_cursor_text() {
        let out = assemble(
            &ctx(Some("let x = 1;")),
            PromptOptions {
                use_visual_selection: true,
                include_after_cursor: false,
            },
        );
        assert_eq!(out.prompt, "let x = 1;");
        assert!(out.delete_selection);
    }

    #[test]
    fn suggest_mode_keeps_selection_in_buffer() {
        let out = assemble(&ctx(Some("let x = 1;")), PromptOptions::default());
        assert_eq!(out.prompt, "let x = 1;");
        assert!(!out.delete_selection);
    }

    #[test]
    fn appends_after_cursor_with_separator() {
        let out = assemble(
            &ctx(None),
            PromptOptions {
                use_visual_selection: false,
                include_after_cursor: true,
            },
        );
        assert_eq!(out.prompt, "fn main() {\n\n\nAFTER CURSOR:\n}\n");
    }
}
