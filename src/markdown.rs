use once_cell::sync::Lazy;
use pulldown_cmark::{html, Options, Parser};
use regex::Regex;

const PARAGRAPH_OPEN: &str = "<p class=\"mb-4\">";

struct Rule {
    pattern: Lazy<Regex>,
    replacement: &'static str,
}

macro_rules! rule {
    ($pattern:expr, $replacement:expr) => {
        Rule {
            pattern: Lazy::new(|| Regex::new($pattern).expect("Invalid markdown regex pattern")),
            replacement: $replacement,
        }
    };
}

static CODE_BLOCK: Rule = rule!(
    r"(?s)```(\w+)?\n(.*?)```",
    r#"<pre class="bg-muted p-4 rounded-lg overflow-x-auto"><code>${2}</code></pre>"#
);
static INLINE_CODE: Rule = rule!(
    r"`([^`]+)`",
    r#"<code class="bg-muted px-1 py-0.5 rounded text-sm">${1}</code>"#
);
static BOLD: Rule = rule!(r"\*\*([^*]+)\*\*", "<strong>${1}</strong>");
static ITALIC: Rule = rule!(r"\*([^*]+)\*", "<em>${1}</em>");
static H3: Rule = rule!(
    r"(?m)^### (.+)$",
    r#"<h3 class="text-xl font-semibold mt-6 mb-3">${1}</h3>"#
);
static H2: Rule = rule!(
    r"(?m)^## (.+)$",
    r#"<h2 class="text-2xl font-bold mt-8 mb-4">${1}</h2>"#
);
static H1: Rule = rule!(
    r"(?m)^# (.+)$",
    r#"<h1 class="text-3xl font-bold mt-8 mb-6">${1}</h1>"#
);
static LINK: Rule = rule!(
    r"\[([^\]]+)\]\(([^)]+)\)",
    r#"<a href="${2}" class="text-primary hover:underline" target="_blank" rel="noopener noreferrer">${1}</a>"#
);
static UNORDERED_ITEM: Rule = rule!(r"(?m)^- (.+)$", r#"<li class="ml-4">• ${1}</li>"#);
static ORDERED_ITEM: Rule = rule!(r"(?m)^(\d+)\. (.+)$", r#"<li class="ml-4">${1}. ${2}</li>"#);

impl Rule {
    fn apply(&self, input: &str) -> String {
        self.pattern.replace_all(input, self.replacement).into_owned()
    }
}

/// Renders post bodies with a fixed chain of substitutions. There is no
/// parser behind this: constructs only combine when the order allows it, and
/// list items are not wrapped in a list element.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostRenderer {
    /// `[text](url)` links. Off by default, in which case links stay literal text.
    pub render_links: bool,
}

impl PostRenderer {
    pub fn new(render_links: bool) -> Self {
        Self { render_links }
    }

    pub fn render(&self, content: &str) -> String {
        let mut out = CODE_BLOCK.apply(content);
        for rule in [&INLINE_CODE, &BOLD, &ITALIC, &H3, &H2, &H1] {
            out = rule.apply(&out);
        }
        if self.render_links {
            out = LINK.apply(&out);
        }
        out = UNORDERED_ITEM.apply(&out);
        out = ORDERED_ITEM.apply(&out);

        let out = out
            .replace("\n\n", &format!("</p>{}", PARAGRAPH_OPEN))
            .replace('\n', "<br>");
        wrap_bare_lines(&out)
    }
}

fn starts_with_block(line: &str) -> bool {
    let mut chars = line.chars();
    if chars.next() != Some('<') {
        return false;
    }
    // `h` or a digit 1-6 right after `<`, as the original character class allowed.
    matches!(chars.next(), Some('h' | '1'..='6'))
        || line.starts_with("<pre")
        || line.starts_with("<li")
        || line.starts_with("</p>")
}

fn wrap_bare_lines(input: &str) -> String {
    input
        .split('\n')
        .map(|line| {
            if line.is_empty() || starts_with_block(line) {
                line.to_string()
            } else {
                format!("{}{}</p>", PARAGRAPH_OPEN, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options
}

/// Site pages (home introduction) go through a real CommonMark parser.
pub fn render_page_markdown(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, markdown_options());
    let mut html_out = String::new();
    html::push_html(&mut html_out, parser);
    html_out
}
