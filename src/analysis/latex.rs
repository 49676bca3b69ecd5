// src/analysis/latex.rs
//! LaTeX rendering for generated resumes and cover letters.

const DOCUMENT_PREAMBLE: &str = r"\documentclass[a4paper,11pt]{article}
\usepackage[T1]{fontenc}
\usepackage{geometry}
\geometry{a4paper, total={170mm,257mm}, left=20mm, top=20mm}
\usepackage{enumitem}
\setlist[itemize]{leftmargin=*}
\linespread{1.15}
\begin{document}
";

const DOCUMENT_CLOSING: &str = r"
\end{document}
";

/// Escapes LaTeX structural characters.
///
/// Works one character at a time, so the braces of `\textbackslash{}` are
/// never themselves re-escaped.
pub fn escape_latex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str(r"\textbackslash{}"),
            '{' => escaped.push_str(r"\{"),
            '}' => escaped.push_str(r"\}"),
            '&' => escaped.push_str(r"\&"),
            '%' => escaped.push_str(r"\%"),
            '$' => escaped.push_str(r"\$"),
            '#' => escaped.push_str(r"\#"),
            '_' => escaped.push_str(r"\_"),
            '~' => escaped.push_str(r"\textasciitilde{}"),
            '^' => escaped.push_str(r"\textasciicircum{}"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Wraps escaped free text in the fixed A4 article template.
pub fn render_document(body: &str) -> String {
    format!(
        "{}{}{}",
        DOCUMENT_PREAMBLE,
        escape_latex(body),
        DOCUMENT_CLOSING
    )
}
