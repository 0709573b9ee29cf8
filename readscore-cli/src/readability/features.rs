//! Lexical feature extraction
//!
//! A single line-oriented pass over a snippet that counts identifiers,
//! keywords, literals and punctuation, then aggregates the counters into
//! per-snippet averages and maxima.
//!
//! Per line, in order:
//! 1. blank lines are counted and skipped
//! 2. a line containing `//` counts as a comment line and nothing else
//! 3. string and char literal spans are stripped to get the code text
//! 4. structural counts run on the code text, string counts on the raw line
//!
//! The output must stay stable across runs: fitted models depend on it.

use crate::models::{Feature, FeatureVector};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::LazyLock;

static DOUBLE_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(\\.|[^"\\])*""#).expect("valid regex"));
static SINGLE_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"'(\\.|[^'\\])*'"#).expect("valid regex"));
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[_a-zA-Z][_a-zA-Z0-9.]*\b").expect("valid regex"));
static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+(\.\d+)?\b").expect("valid regex"));
static WHOLE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\b\d+(\.\d+)?\b$").expect("valid regex"));
static STRING_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(.*?)""#).expect("valid regex"));
static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\r\n|[\n\r\x0B\x0C\x1C\x1D\x1E\x{85}\x{2028}\x{2029}]").expect("valid regex")
});

/// Go reserved words (https://go101.org/article/keywords-and-identifiers.html)
pub const GO_KEYWORDS: &[&str] = &[
    "break", "default", "func", "interface", "select", "case", "defer", "go",
    "map", "struct", "chan", "else", "goto", "package", "switch", "const",
    "fallthrough", "if", "range", "type", "continue", "for", "import",
    "return", "var",
];

/// Immutable set of reserved words for one lexical family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSet {
    words: HashSet<String>,
}

impl KeywordSet {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words.into_iter().map(Into::into).collect(),
        }
    }

    /// The Go keyword set
    pub fn go() -> Self {
        Self::new(GO_KEYWORDS.iter().copied())
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for KeywordSet {
    fn default() -> Self {
        Self::go()
    }
}

/// How comment text lengths combine across comment lines.
///
/// `Last` keeps only the most recent comment's length. The built-in model
/// was fitted on that behaviour, so it stays the default. `Sum` adds every
/// comment's length like the other totals do; models trained with it are
/// not interchangeable with `Last` models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentLength {
    #[default]
    Last,
    Sum,
}

/// Extractor settings, fixed at construction time
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub keywords: KeywordSet,
    pub comment_length: CommentLength,
    /// Features returned by [`FeatureExtractor::extract_features`]
    pub selection: Vec<Feature>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            keywords: KeywordSet::go(),
            comment_length: CommentLength::Last,
            selection: Feature::MODEL_DEFAULT.to_vec(),
        }
    }
}

impl ExtractorConfig {
    pub fn with_keywords(mut self, keywords: KeywordSet) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_comment_length(mut self, comment_length: CommentLength) -> Self {
        self.comment_length = comment_length;
        self
    }

    pub fn with_selection(mut self, selection: Vec<Feature>) -> Self {
        self.selection = selection;
        self
    }
}

/// Raw counters for one snippet plus the derived statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnippetMetrics {
    pub total_lines: usize,
    pub blank_lines: usize,
    pub comment_lines: usize,
    /// Last or summed comment text length, see [`CommentLength`]
    pub comment_length: usize,
    pub total_line_length: usize,
    pub max_line_length: usize,
    pub total_indentation: usize,
    pub max_indentation: usize,
    pub total_identifiers: usize,
    pub max_identifiers: usize,
    pub total_identifier_length: usize,
    pub max_identifier_length: usize,
    pub total_keywords: usize,
    pub max_keywords: usize,
    pub total_numbers: usize,
    pub max_numbers: usize,
    pub total_strings: usize,
    pub total_strings_length: usize,
    pub total_periods: usize,
    pub total_commas: usize,
    pub total_spaces: usize,
    pub total_parentheses: usize,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl SnippetMetrics {
    /// Value of a single named statistic. Zero denominators give 0.
    pub fn value(&self, feature: Feature) -> f64 {
        let lines = self.total_lines;
        match feature {
            Feature::AvgLineLength => ratio(self.total_line_length, lines),
            Feature::MaxLineLength => self.max_line_length as f64,
            Feature::AvgNumIdentifiers => ratio(self.total_identifiers, lines),
            Feature::MaxNumIdentifiers => self.max_identifiers as f64,
            Feature::AvgIdentifierLen => {
                ratio(self.total_identifier_length, self.total_identifiers)
            }
            Feature::MaxIdentifierLen => self.max_identifier_length as f64,
            Feature::AvgIndentation => ratio(self.total_indentation, lines),
            Feature::MaxIndentation => self.max_indentation as f64,
            Feature::AvgKeywords => ratio(self.total_keywords, lines),
            Feature::AvgNumbers => ratio(self.total_numbers, lines),
            Feature::AvgComments => ratio(self.comment_lines, lines),
            Feature::AvgCommentLen => ratio(self.comment_length, self.comment_lines),
            Feature::AvgStrings => ratio(self.total_strings, lines),
            Feature::AvgStringsLen => ratio(self.total_strings_length, self.total_strings),
            Feature::AvgCommasPeriods => ratio(self.total_periods + self.total_commas, lines),
            Feature::AvgSpaces => ratio(self.total_spaces, lines),
            Feature::AvgParenthesis => ratio(self.total_parentheses, lines),
            Feature::AvgBlankLines => ratio(self.blank_lines, lines),
        }
    }

    /// Values for `selection`, in that order
    pub fn features(&self, selection: &[Feature]) -> FeatureVector {
        selection.iter().map(|&f| (f, self.value(f))).collect()
    }

    /// Every statistic, in table column order
    pub fn all_features(&self) -> FeatureVector {
        self.features(Feature::all())
    }
}

/// How a single line takes part in the scan
#[derive(Debug, PartialEq)]
enum LineKind<'a> {
    Blank,
    Comment { text: &'a str },
    Code { code: Cow<'a, str> },
}

fn classify(line: &str) -> LineKind<'_> {
    if line.trim().is_empty() {
        return LineKind::Blank;
    }
    if let Some(idx) = line.find("//") {
        return LineKind::Comment {
            text: line[idx + 2..].trim(),
        };
    }
    LineKind::Code {
        code: strip_literals(line),
    }
}

/// Remove double-quoted, then single-quoted, literal spans.
fn strip_literals(line: &str) -> Cow<'_, str> {
    match DOUBLE_QUOTED.replace_all(line, "") {
        Cow::Borrowed(rest) => SINGLE_QUOTED.replace_all(rest, ""),
        Cow::Owned(rest) => Cow::Owned(SINGLE_QUOTED.replace_all(&rest, "").into_owned()),
    }
}

/// Split on every line boundary, including lone `\r`, form feed and the
/// Unicode separators. A trailing terminator does not start another line.
fn split_lines(source: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = LINE_BREAK.split(source).collect();
    if lines.last().is_some_and(|last| last.is_empty()) {
        lines.pop();
    }
    lines
}

fn leading_tabs(line: &str) -> usize {
    line.chars().take_while(|&c| c == '\t').count()
}

/// Extracts lexical statistics from source snippets.
///
/// Holds no per-call state, so one extractor can serve many threads.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    config: ExtractorConfig,
}

impl FeatureExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.config.keywords
    }

    pub fn selection(&self) -> &[Feature] {
        &self.config.selection
    }

    /// Scan a snippet and return all counters.
    ///
    /// Never fails: any text, including empty or binary-looking input,
    /// produces a metrics value.
    pub fn extract(&self, source: &str) -> SnippetMetrics {
        let mut m = SnippetMetrics::default();

        for line in split_lines(source) {
            m.total_lines += 1;

            let code = match classify(line) {
                LineKind::Blank => {
                    m.blank_lines += 1;
                    continue;
                }
                LineKind::Comment { text } => {
                    m.comment_lines += 1;
                    let len = text.chars().count();
                    match self.config.comment_length {
                        CommentLength::Last => m.comment_length = len,
                        CommentLength::Sum => m.comment_length += len,
                    }
                    continue;
                }
                LineKind::Code { code } => code,
            };

            let line_length = code.chars().count();
            m.total_line_length += line_length;
            m.max_line_length = m.max_line_length.max(line_length);

            let indentation = leading_tabs(line);
            m.total_indentation += indentation;
            m.max_indentation = m.max_indentation.max(indentation);

            let words: Vec<&str> = IDENTIFIER.find_iter(&code).map(|w| w.as_str()).collect();

            let mut identifiers = 0;
            for word in &words {
                if self.config.keywords.contains(word) || WHOLE_NUMBER.is_match(word) {
                    continue;
                }
                let len = word.chars().count();
                identifiers += 1;
                m.total_identifier_length += len;
                m.max_identifier_length = m.max_identifier_length.max(len);
            }
            m.total_identifiers += identifiers;
            m.max_identifiers = m.max_identifiers.max(identifiers);

            let keywords = words
                .iter()
                .filter(|w| self.config.keywords.contains(w))
                .count();
            m.total_keywords += keywords;
            m.max_keywords = m.max_keywords.max(keywords);

            let numbers = NUMBER.find_iter(&code).count();
            m.total_numbers += numbers;
            m.max_numbers = m.max_numbers.max(numbers);

            for caps in STRING_LITERAL.captures_iter(line) {
                m.total_strings += 1;
                m.total_strings_length += caps.get(1).map_or(0, |s| s.as_str().chars().count());
            }

            for c in code.chars() {
                match c {
                    '.' => m.total_periods += 1,
                    ',' => m.total_commas += 1,
                    ' ' => m.total_spaces += 1,
                    '(' | ')' | '{' | '}' => m.total_parentheses += 1,
                    _ => {}
                }
            }
        }

        m
    }

    /// Extract and keep only the configured feature selection.
    pub fn extract_features(&self, source: &str) -> FeatureVector {
        self.extract(source).features(&self.config.selection)
    }
}
