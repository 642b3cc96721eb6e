//! Lua table literal parsing for WoW SavedVariables files.
//!
//! The WoW client persists addon state as Lua source containing top-level
//! assignments of nested table literals:
//! ```text
//! DataStore_ReputationsDB = {
//!     ["global"] = {
//!         ["Characters"] = {
//!             ["Account.Realm.Name"] = {
//!                 ["Factions"] = { [87] = { earned = 8350 } },
//!             },
//!         },
//!     },
//! }
//! ```
//! Parsing is deliberately lenient: save files are often read while the
//! client is still writing them, so malformed or truncated input degrades
//! to safe defaults instead of failing.

use regex::Regex;
use std::collections::BTreeMap;

/// A table key. Integer keys order before string keys, so map iteration
/// walks positional slots first and named keys alphabetically after.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum LuaKey {
    Int(i64),
    Str(String),
}

impl LuaKey {
    /// Key as an integer, accepting numeric string keys like `["87"]`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            LuaKey::Int(n) => Some(*n),
            LuaKey::Str(s) => s.parse().ok(),
        }
    }

    /// Key rendered as text.
    pub fn to_text(&self) -> String {
        match self {
            LuaKey::Int(n) => n.to_string(),
            LuaKey::Str(s) => s.clone(),
        }
    }
}

/// A parsed Lua value. Tables come out as either a sequence (every key was
/// a positional slot and at least one entry exists) or a map (everything
/// else, with positional entries keyed by their 1-based slot).
#[derive(Debug, Clone, PartialEq)]
pub enum LuaValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<LuaValue>),
    Map(BTreeMap<LuaKey, LuaValue>),
}

impl LuaValue {
    pub fn empty_map() -> Self {
        LuaValue::Map(BTreeMap::new())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, LuaValue::Nil)
    }

    pub fn as_map(&self) -> Option<&BTreeMap<LuaKey, LuaValue>> {
        match self {
            LuaValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[LuaValue]> {
        match self {
            LuaValue::Seq(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LuaValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            LuaValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            LuaValue::Int(n) => Some(*n),
            LuaValue::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            LuaValue::Int(n) => Some(*n as f64),
            LuaValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Look up a string key in a map value.
    pub fn get(&self, key: &str) -> Option<&LuaValue> {
        self.as_map()
            .and_then(|map| map.get(&LuaKey::Str(key.to_string())))
    }

    /// Look up a 1-based index in a sequence, or an integer key in a map.
    pub fn get_index(&self, index: i64) -> Option<&LuaValue> {
        match self {
            LuaValue::Seq(values) => {
                if index < 1 {
                    return None;
                }
                values.get(index as usize - 1)
            }
            LuaValue::Map(map) => map.get(&LuaKey::Int(index)),
            _ => None,
        }
    }
}

/// Parse the first top-level `Name = { ... }` assignment in a
/// SavedVariables source fragment.
///
/// Returns a map of the variable name to its parsed value, or an empty map
/// when no assignment is found. Never fails: unparseable tokens degrade to
/// safe defaults so a half-written file still yields usable data.
pub fn parse(source: &str) -> LuaValue {
    let assignment = Regex::new(r"(\w+)\s*=\s*\{").unwrap();

    for caps in assignment.captures_iter(source) {
        let whole = caps.get(0).unwrap();
        if in_line_comment(source, whole.start()) {
            continue;
        }
        let name = caps.get(1).unwrap().as_str().to_string();

        // The match ends on the opening brace; hand everything from there
        // to the cursor.
        let mut parser = Parser::new(&source[whole.end() - 1..]);
        let value = parser.parse_value();

        let mut map = BTreeMap::new();
        map.insert(LuaKey::Str(name), value);
        return LuaValue::Map(map);
    }

    LuaValue::empty_map()
}

/// True when `--` appears between the start of the line and `at`, meaning
/// the assignment candidate sits in a line comment.
fn in_line_comment(source: &str, at: usize) -> bool {
    let line_start = source[..at].rfind('\n').map(|i| i + 1).unwrap_or(0);
    source[line_start..at].contains("--")
}

/// Single-use cursor over one parse call. Owns its position exclusively,
/// so concurrent parses never share state.
struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Advance over whitespace and `-- ...` line comments. Comments are
    /// consumed here, interleaved with tokenization, so a `--` inside a
    /// string literal is never mistaken for one.
    fn skip_whitespace(&mut self) {
        loop {
            while self.peek().is_some_and(|c| c.is_whitespace()) {
                self.pos += 1;
            }
            if self.peek() == Some('-') && self.chars.get(self.pos + 1) == Some(&'-') {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    fn parse_value(&mut self) -> LuaValue {
        self.skip_whitespace();
        let Some(c) = self.peek() else {
            return LuaValue::Nil;
        };

        match c {
            '{' => self.parse_table(),
            '"' => LuaValue::Str(self.parse_string()),
            c if c.is_ascii_digit() || c == '-' => self.parse_number(),
            _ => {
                if self.eat_keyword("true") {
                    return LuaValue::Bool(true);
                }
                if self.eat_keyword("false") {
                    return LuaValue::Bool(false);
                }
                if self.eat_keyword("nil") {
                    return LuaValue::Nil;
                }
                let word = self.parse_bareword();
                if word.is_empty() && !self.at_structural_char() {
                    // Unknown character: skip it so parsing always advances.
                    self.pos += 1;
                }
                LuaValue::Str(word)
            }
        }
    }

    /// True when the cursor sits on a character the table loop itself
    /// handles. Those must not be swallowed by the garbage fallback.
    fn at_structural_char(&self) -> bool {
        matches!(self.peek(), Some('}') | Some(']') | Some(',') | Some(';'))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let end = self.pos + keyword.len();
        if end > self.chars.len() {
            return false;
        }
        let candidate: String = self.chars[self.pos..end].iter().collect();
        if candidate != keyword {
            return false;
        }
        // Boundary check so barewords like `nilbog` stay barewords.
        if self
            .chars
            .get(end)
            .is_some_and(|c| c.is_alphanumeric() || *c == '_')
        {
            return false;
        }
        self.pos = end;
        true
    }

    fn parse_bareword(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// Scan a quoted string up to the next unescaped `"`. A backslash
    /// skips two characters; the raw pair is passed through undecoded.
    fn parse_string(&mut self) -> String {
        self.pos += 1; // opening quote
        let start = self.pos;
        while self.pos < self.chars.len() && self.chars[self.pos] != '"' {
            if self.chars[self.pos] == '\\' {
                self.pos += 2;
            } else {
                self.pos += 1;
            }
        }
        let end = self.pos.min(self.chars.len());
        let value: String = self.chars[start..end].iter().collect();
        if self.pos < self.chars.len() {
            self.pos += 1; // closing quote
        }
        value
    }

    /// Scan an optional `-`, digits, and at most one `.`. Integral results
    /// come back as `Int`; malformed numeric text degrades to `Int(0)`.
    fn parse_number(&mut self) -> LuaValue {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else if c == '.' && !seen_dot {
                seen_dot = true;
                self.pos += 1;
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match text.parse::<f64>() {
            Ok(v) if v.fract() == 0.0 && v.abs() <= i64::MAX as f64 => LuaValue::Int(v as i64),
            Ok(v) => LuaValue::Float(v),
            Err(_) => LuaValue::Int(0),
        }
    }

    /// Parse a table body after the opening `{`. Classification between
    /// sequence and map happens once, when the closing brace is consumed;
    /// a table truncated by end-of-input is always a map.
    fn parse_table(&mut self) -> LuaValue {
        self.pos += 1; // opening brace
        let mut entries: Vec<(LuaKey, LuaValue)> = Vec::new();
        let mut is_seq = true;
        let mut next_slot: i64 = 1;

        loop {
            self.skip_whitespace();
            let Some(c) = self.peek() else {
                return Self::close_table(entries, false);
            };
            if c == '}' {
                self.pos += 1;
                return Self::close_table(entries, is_seq);
            }

            let key = if c == '[' {
                is_seq = false;
                self.parse_bracketed_key()
            } else if c.is_alphabetic() || c == '_' {
                is_seq = false;
                let word = self.parse_bareword();
                self.skip_whitespace();
                if self.peek() == Some('=') {
                    self.pos += 1;
                }
                LuaKey::Str(word)
            } else {
                let slot = next_slot;
                next_slot += 1;
                LuaKey::Int(slot)
            };

            let value = self.parse_value();
            entries.push((key, value));

            self.skip_whitespace();
            if matches!(self.peek(), Some(',') | Some(';')) {
                self.pos += 1;
            }
        }
    }

    fn parse_bracketed_key(&mut self) -> LuaKey {
        self.pos += 1; // opening bracket
        self.skip_whitespace();
        let key = if self.peek() == Some('"') {
            LuaKey::Str(self.parse_string())
        } else {
            match self.parse_number() {
                LuaValue::Int(n) => LuaKey::Int(n),
                LuaValue::Float(f) => LuaKey::Str(f.to_string()),
                _ => LuaKey::Int(0),
            }
        };
        self.skip_whitespace();
        if self.peek() == Some(']') {
            self.pos += 1;
        }
        self.skip_whitespace();
        if self.peek() == Some('=') {
            self.pos += 1;
        }
        key
    }

    fn close_table(entries: Vec<(LuaKey, LuaValue)>, is_seq: bool) -> LuaValue {
        if is_seq && !entries.is_empty() {
            return LuaValue::Seq(entries.into_iter().map(|(_, v)| v).collect());
        }
        LuaValue::Map(entries.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn top(value: &LuaValue, name: &str) -> LuaValue {
        value.get(name).cloned().expect("top-level variable")
    }

    #[test]
    fn test_positional_table_is_sequence() {
        let parsed = parse("t = {1,2,3}");
        assert_eq!(
            top(&parsed, "t"),
            LuaValue::Seq(vec![LuaValue::Int(1), LuaValue::Int(2), LuaValue::Int(3)])
        );
    }

    #[test]
    fn test_named_keys_form_map() {
        let parsed = parse(r#"t = {a="x", b=5}"#);
        let table = top(&parsed, "t");
        assert_eq!(table.get("a"), Some(&LuaValue::Str("x".to_string())));
        assert_eq!(table.get("b"), Some(&LuaValue::Int(5)));
    }

    #[test]
    fn test_bracketed_integer_keys_stay_a_map() {
        let parsed = parse(r#"t = {[10]="x", [20]="y"}"#);
        let table = top(&parsed, "t");
        assert!(table.as_seq().is_none());
        assert_eq!(table.get_index(10), Some(&LuaValue::Str("x".to_string())));
        assert_eq!(table.get_index(20), Some(&LuaValue::Str("y".to_string())));
    }

    #[test]
    fn test_mixed_table_is_map_with_positional_slots() {
        let parsed = parse("t = {1, a=2, 3}");
        let table = top(&parsed, "t");
        assert!(table.as_seq().is_none());
        assert_eq!(table.get_index(1), Some(&LuaValue::Int(1)));
        assert_eq!(table.get("a"), Some(&LuaValue::Int(2)));
        assert_eq!(table.get_index(2), Some(&LuaValue::Int(3)));
    }

    #[test]
    fn test_comment_before_assignment() {
        let parsed = parse("-- comment\nt = {}");
        assert_eq!(top(&parsed, "t"), LuaValue::empty_map());
    }

    #[test]
    fn test_commented_out_assignment_is_skipped() {
        let parsed = parse("-- old = {1}\nt = {2}");
        assert!(parsed.get("old").is_none());
        assert_eq!(top(&parsed, "t"), LuaValue::Seq(vec![LuaValue::Int(2)]));
    }

    #[test]
    fn test_no_assignment_returns_empty_map() {
        assert_eq!(parse("garbage no assignment"), LuaValue::empty_map());
    }

    #[test]
    fn test_number_typing() {
        let parsed = parse("t = {3.0, 3.5, -7}");
        assert_eq!(
            top(&parsed, "t"),
            LuaValue::Seq(vec![
                LuaValue::Int(3),
                LuaValue::Float(3.5),
                LuaValue::Int(-7)
            ])
        );
    }

    #[test]
    fn test_malformed_number_degrades_to_zero() {
        let parsed = parse("t = {x = -}");
        assert_eq!(top(&parsed, "t").get("x"), Some(&LuaValue::Int(0)));
    }

    #[test]
    fn test_comment_marker_inside_string_survives() {
        let parsed = parse(r#"t = {msg = "before--after"}"#);
        assert_eq!(
            top(&parsed, "t").get("msg"),
            Some(&LuaValue::Str("before--after".to_string()))
        );
    }

    #[test]
    fn test_escaped_quote_passes_through_raw() {
        let parsed = parse("t = {s = \"a\\\"b\"}");
        assert_eq!(
            top(&parsed, "t").get("s"),
            Some(&LuaValue::Str("a\\\"b".to_string()))
        );
    }

    #[test]
    fn test_semicolon_and_trailing_separators() {
        let parsed = parse("t = {1; 2, 3,}");
        assert_eq!(
            top(&parsed, "t"),
            LuaValue::Seq(vec![LuaValue::Int(1), LuaValue::Int(2), LuaValue::Int(3)])
        );
    }

    #[test]
    fn test_truncated_table_is_map() {
        // File read mid-write: no closing brace, so no sequence promotion.
        let parsed = parse("t = {1, 2");
        let table = top(&parsed, "t");
        assert!(table.as_seq().is_none());
        assert_eq!(table.get_index(1), Some(&LuaValue::Int(1)));
        assert_eq!(table.get_index(2), Some(&LuaValue::Int(2)));
    }

    #[test]
    fn test_booleans_and_nil() {
        let parsed = parse("t = {[1]=true, [2]=false, [3]=nil}");
        let table = top(&parsed, "t");
        assert_eq!(table.get_index(1), Some(&LuaValue::Bool(true)));
        assert_eq!(table.get_index(2), Some(&LuaValue::Bool(false)));
        assert_eq!(table.get_index(3), Some(&LuaValue::Nil));
    }

    #[test]
    fn test_bareword_value_is_string() {
        let parsed = parse("t = {class = WARLOCK}");
        assert_eq!(
            top(&parsed, "t").get("class"),
            Some(&LuaValue::Str("WARLOCK".to_string()))
        );
    }

    #[test]
    fn test_nested_saved_variables_shape() {
        let source = r#"
            DataStore_ReputationsDB = {
                ["global"] = {
                    ["Characters"] = {
                        ["Account.Realm.Name"] = {
                            ["Factions"] = {
                                [87] = { earned = 8350 },
                            },
                            lastUpdate = 1700000000,
                        },
                    },
                },
            }
        "#;
        let parsed = parse(source);
        let earned = parsed
            .get("DataStore_ReputationsDB")
            .and_then(|db| db.get("global"))
            .and_then(|g| g.get("Characters"))
            .and_then(|c| c.get("Account.Realm.Name"))
            .and_then(|c| c.get("Factions"))
            .and_then(|f| f.get_index(87))
            .and_then(|r| r.get("earned"))
            .and_then(|v| v.as_i64());
        assert_eq!(earned, Some(8350));
    }

    #[test]
    fn test_garbage_tokens_still_terminate() {
        let parsed = parse("t = {@@, 5}");
        let table = top(&parsed, "t");
        // Garbage slots degrade to empty barewords; the 5 still lands.
        assert!(table.as_seq().is_some());
    }

    fn seq_literal(values: &[LuaValue]) -> String {
        let rendered: Vec<String> = values
            .iter()
            .map(|v| match v {
                LuaValue::Int(n) => n.to_string(),
                other => panic!("only integer sequences are re-serialized: {:?}", other),
            })
            .collect();
        format!("t = {{{}}}", rendered.join(", "))
    }

    #[test]
    fn test_sequence_round_trip() {
        let parsed = parse("t = {4, 8, 15, 16, 23, 42}");
        let first = top(&parsed, "t");
        let reparsed = parse(&seq_literal(first.as_seq().expect("sequence")));
        assert_eq!(top(&reparsed, "t"), first);
    }
}
