//! Symbol table - LaTeX control sequence names to descriptors
//!
//! The table is built once on first use and is read-only afterwards. Two
//! lookups are offered: [`lookup_symbol`] for glyph-producing names and
//! [`lookup_keyword`] which additionally classifies construct commands
//! (`\frac`, `\sqrt`, `\mathbf`, `\left`, ...).

use crate::font::{FontFamily, FontId};
use crate::model::{DecorationKind, FracStyle, Limits};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

// =============================================================================
// Descriptors
// =============================================================================

/// Typesetting class of a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolClass {
    Ordinary,
    Greek,
    BinaryOp,
    Relation,
    /// Big operators such as `\sum` (take limits in display style)
    LargeOp,
    /// Upright function names such as `\sin`
    Function,
    /// Function names that take limits such as `\lim`
    LimitFunction,
    Arrow,
    Delimiter,
    Punctuation,
    Space,
    Dots,
}

/// Immutable description of one named symbol
#[derive(Debug, PartialEq, Eq)]
pub struct SymbolInfo {
    /// Control sequence name without the backslash
    pub name: &'static str,
    /// Unicode text drawn for the symbol
    pub glyph: &'static str,
    pub family: FontFamily,
    pub class: SymbolClass,
    /// Letter-like symbols are set like variables (no operator spacing)
    pub alpha_like: bool,
    /// LaTeX package that must be loaded for the name to exist
    pub requires: Option<&'static str>,
    /// Width in mu for space symbols, zero otherwise
    pub space_mu: i32,
}

impl SymbolInfo {
    const fn new(
        name: &'static str,
        glyph: &'static str,
        family: FontFamily,
        class: SymbolClass,
    ) -> Self {
        Self {
            name,
            glyph,
            family,
            class,
            alpha_like: false,
            requires: None,
            space_mu: 0,
        }
    }

    const fn alpha(mut self) -> Self {
        self.alpha_like = true;
        self
    }

    const fn requires(mut self, package: &'static str) -> Self {
        self.requires = Some(package);
        self
    }

    const fn space(mut self, mu: i32) -> Self {
        self.space_mu = mu;
        self
    }

    /// Whether the symbol can carry limits above and below
    pub fn takes_limits(&self) -> bool {
        matches!(self.class, SymbolClass::LargeOp | SymbolClass::LimitFunction)
    }

    /// Whether the name ends in a letter, so a following letter needs a separator
    pub fn is_control_word(&self) -> bool {
        self.name
            .chars()
            .last()
            .map(|c| c.is_ascii_alphabetic())
            .unwrap_or(false)
    }
}

/// A reference into the symbol table
///
/// Serialized as the symbol name; deserializing an unknown name fails.
#[derive(Clone, Copy)]
pub struct SymbolRef(&'static SymbolInfo);

impl SymbolRef {
    /// Look up a symbol by name
    pub fn new(name: &str) -> Option<Self> {
        lookup_symbol(name).map(SymbolRef)
    }

    pub fn info(&self) -> &'static SymbolInfo {
        self.0
    }

    pub fn name(&self) -> &'static str {
        self.0.name
    }
}

impl std::ops::Deref for SymbolRef {
    type Target = SymbolInfo;

    fn deref(&self) -> &SymbolInfo {
        self.0
    }
}

impl PartialEq for SymbolRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.name == other.0.name
    }
}

impl Eq for SymbolRef {}

impl fmt::Debug for SymbolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\\{}", self.0.name)
    }
}

impl Serialize for SymbolRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.name)
    }
}

impl<'de> Deserialize<'de> for SymbolRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        SymbolRef::new(&name).ok_or_else(|| {
            serde::de::Error::custom(crate::error::MathError::UnknownSymbol(name))
        })
    }
}

// =============================================================================
// Keywords
// =============================================================================

/// Classification of a control sequence name
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Keyword {
    Symbol(SymbolRef),
    /// Prefix fraction taking two arguments
    Fraction(FracStyle),
    /// Infix fraction splitting the enclosing group
    InfixFraction(FracStyle),
    Sqrt,
    Font(FontId),
    /// Old-style switch that applies to the rest of the group
    OldFont(FontId),
    Decoration(DecorationKind),
    Left,
    Right,
    Begin,
    End,
    Limits(Limits),
    Label,
    NoNumber,
    NewCommand,
}

impl Keyword {
    /// Number of mandatory braced arguments a construct consumes
    pub fn arity(&self) -> usize {
        match self {
            Keyword::Fraction(_) => 2,
            Keyword::Sqrt | Keyword::Font(_) | Keyword::Decoration(_) | Keyword::Label => 1,
            _ => 0,
        }
    }
}

/// Look up a glyph-producing symbol
pub fn lookup_symbol(name: &str) -> Option<&'static SymbolInfo> {
    table().get(name).copied()
}

/// Classify a control sequence name (without backslash)
pub fn lookup_keyword(name: &str) -> Option<Keyword> {
    let keyword = match name {
        "frac" => Keyword::Fraction(FracStyle::Frac),
        "dfrac" => Keyword::Fraction(FracStyle::Dfrac),
        "tfrac" => Keyword::Fraction(FracStyle::Tfrac),
        "binom" => Keyword::Fraction(FracStyle::Binom),
        "over" => Keyword::InfixFraction(FracStyle::Over),
        "atop" => Keyword::InfixFraction(FracStyle::Atop),
        "choose" => Keyword::InfixFraction(FracStyle::Choose),
        "sqrt" => Keyword::Sqrt,
        "mathrm" => Keyword::Font(FontId::MathRm),
        "mathbf" => Keyword::Font(FontId::MathBf),
        "mathit" => Keyword::Font(FontId::MathIt),
        "mathsf" => Keyword::Font(FontId::MathSf),
        "mathtt" => Keyword::Font(FontId::MathTt),
        "mathcal" => Keyword::Font(FontId::MathCal),
        "mathbb" => Keyword::Font(FontId::MathBb),
        "mathfrak" => Keyword::Font(FontId::MathFrak),
        "text" | "textrm" => Keyword::Font(FontId::TextRm),
        "textbf" => Keyword::Font(FontId::TextBf),
        "textit" => Keyword::Font(FontId::TextIt),
        "textsf" => Keyword::Font(FontId::TextSf),
        "texttt" => Keyword::Font(FontId::TextTt),
        "mbox" => Keyword::Font(FontId::Mbox),
        "rm" => Keyword::OldFont(FontId::MathRm),
        "bf" => Keyword::OldFont(FontId::MathBf),
        "it" => Keyword::OldFont(FontId::MathIt),
        "sf" => Keyword::OldFont(FontId::MathSf),
        "tt" => Keyword::OldFont(FontId::MathTt),
        "cal" => Keyword::OldFont(FontId::MathCal),
        "left" => Keyword::Left,
        "right" => Keyword::Right,
        "begin" => Keyword::Begin,
        "end" => Keyword::End,
        "limits" => Keyword::Limits(Limits::Limits),
        "nolimits" => Keyword::Limits(Limits::NoLimits),
        "label" => Keyword::Label,
        "nonumber" | "notag" => Keyword::NoNumber,
        "newcommand" | "renewcommand" => Keyword::NewCommand,
        _ => {
            if let Some(deco) = DecorationKind::from_name(name) {
                Keyword::Decoration(deco)
            } else {
                return SymbolRef::new(name).map(Keyword::Symbol);
            }
        }
    };
    Some(keyword)
}

/// Whether `name` may follow `\left` or `\right` as a delimiter
pub fn is_delimiter_name(name: &str) -> bool {
    matches!(
        name,
        "(" | ")"
            | "["
            | "]"
            | "."
            | "|"
            | "/"
            | "\\{"
            | "\\}"
            | "\\|"
            | "\\langle"
            | "\\rangle"
            | "\\lfloor"
            | "\\rfloor"
            | "\\lceil"
            | "\\rceil"
            | "\\vert"
            | "\\Vert"
            | "\\lbrace"
            | "\\rbrace"
            | "\\backslash"
    )
}

fn table() -> &'static HashMap<&'static str, &'static SymbolInfo> {
    static TABLE: OnceLock<HashMap<&'static str, &'static SymbolInfo>> = OnceLock::new();
    TABLE.get_or_init(|| SYMBOLS.iter().map(|s| (s.name, s)).collect())
}

/// Iterate over every symbol in the table
pub fn all_symbols() -> impl Iterator<Item = &'static SymbolInfo> {
    SYMBOLS.iter()
}

// =============================================================================
// Table
// =============================================================================

use FontFamily::{Extension as EX, MathItalic as MI, Roman as RM, Symbol as SY};
use SymbolClass::*;

const fn greek(name: &'static str, glyph: &'static str) -> SymbolInfo {
    SymbolInfo::new(name, glyph, MI, Greek).alpha()
}

const fn upper_greek(name: &'static str, glyph: &'static str) -> SymbolInfo {
    SymbolInfo::new(name, glyph, RM, Greek).alpha()
}

const fn bin(name: &'static str, glyph: &'static str) -> SymbolInfo {
    SymbolInfo::new(name, glyph, SY, BinaryOp)
}

const fn rel(name: &'static str, glyph: &'static str) -> SymbolInfo {
    SymbolInfo::new(name, glyph, SY, Relation)
}

const fn arrow(name: &'static str, glyph: &'static str) -> SymbolInfo {
    SymbolInfo::new(name, glyph, SY, Arrow)
}

const fn big(name: &'static str, glyph: &'static str) -> SymbolInfo {
    SymbolInfo::new(name, glyph, EX, LargeOp)
}

const fn func(name: &'static str) -> SymbolInfo {
    SymbolInfo::new(name, name, RM, Function)
}

const fn func_lim(name: &'static str) -> SymbolInfo {
    SymbolInfo::new(name, name, RM, LimitFunction)
}

const fn ord(name: &'static str, glyph: &'static str) -> SymbolInfo {
    SymbolInfo::new(name, glyph, SY, Ordinary)
}

const fn delim(name: &'static str, glyph: &'static str) -> SymbolInfo {
    SymbolInfo::new(name, glyph, SY, Delimiter)
}

const fn space(name: &'static str, mu: i32) -> SymbolInfo {
    SymbolInfo::new(name, "", RM, Space).space(mu)
}

static SYMBOLS: &[SymbolInfo] = &[
    // Greek lowercase
    greek("alpha", "\u{03B1}"),
    greek("beta", "\u{03B2}"),
    greek("gamma", "\u{03B3}"),
    greek("delta", "\u{03B4}"),
    greek("epsilon", "\u{03F5}"),
    greek("varepsilon", "\u{03B5}"),
    greek("zeta", "\u{03B6}"),
    greek("eta", "\u{03B7}"),
    greek("theta", "\u{03B8}"),
    greek("vartheta", "\u{03D1}"),
    greek("iota", "\u{03B9}"),
    greek("kappa", "\u{03BA}"),
    greek("lambda", "\u{03BB}"),
    greek("mu", "\u{03BC}"),
    greek("nu", "\u{03BD}"),
    greek("xi", "\u{03BE}"),
    greek("pi", "\u{03C0}"),
    greek("varpi", "\u{03D6}"),
    greek("rho", "\u{03C1}"),
    greek("varrho", "\u{03F1}"),
    greek("sigma", "\u{03C3}"),
    greek("varsigma", "\u{03C2}"),
    greek("tau", "\u{03C4}"),
    greek("upsilon", "\u{03C5}"),
    greek("phi", "\u{03D5}"),
    greek("varphi", "\u{03C6}"),
    greek("chi", "\u{03C7}"),
    greek("psi", "\u{03C8}"),
    greek("omega", "\u{03C9}"),
    // Greek uppercase
    upper_greek("Gamma", "\u{0393}"),
    upper_greek("Delta", "\u{0394}"),
    upper_greek("Theta", "\u{0398}"),
    upper_greek("Lambda", "\u{039B}"),
    upper_greek("Xi", "\u{039E}"),
    upper_greek("Pi", "\u{03A0}"),
    upper_greek("Sigma", "\u{03A3}"),
    upper_greek("Upsilon", "\u{03A5}"),
    upper_greek("Phi", "\u{03A6}"),
    upper_greek("Psi", "\u{03A8}"),
    upper_greek("Omega", "\u{03A9}"),
    // Binary operators
    bin("pm", "\u{00B1}"),
    bin("mp", "\u{2213}"),
    bin("times", "\u{00D7}"),
    bin("div", "\u{00F7}"),
    bin("cdot", "\u{22C5}"),
    bin("ast", "\u{2217}"),
    bin("star", "\u{22C6}"),
    bin("circ", "\u{2218}"),
    bin("bullet", "\u{2219}"),
    bin("cap", "\u{2229}"),
    bin("cup", "\u{222A}"),
    bin("vee", "\u{2228}"),
    bin("lor", "\u{2228}"),
    bin("wedge", "\u{2227}"),
    bin("land", "\u{2227}"),
    bin("oplus", "\u{2295}"),
    bin("ominus", "\u{2296}"),
    bin("otimes", "\u{2297}"),
    bin("oslash", "\u{2298}"),
    bin("odot", "\u{2299}"),
    bin("setminus", "\u{2216}"),
    bin("wr", "\u{2240}"),
    bin("amalg", "\u{2A3F}"),
    // Relations
    rel("leq", "\u{2264}"),
    rel("le", "\u{2264}"),
    rel("geq", "\u{2265}"),
    rel("ge", "\u{2265}"),
    rel("neq", "\u{2260}"),
    rel("ne", "\u{2260}"),
    rel("equiv", "\u{2261}"),
    rel("approx", "\u{2248}"),
    rel("sim", "\u{223C}"),
    rel("simeq", "\u{2243}"),
    rel("cong", "\u{2245}"),
    rel("propto", "\u{221D}"),
    rel("subset", "\u{2282}"),
    rel("supset", "\u{2283}"),
    rel("subseteq", "\u{2286}"),
    rel("supseteq", "\u{2287}"),
    rel("in", "\u{2208}"),
    rel("ni", "\u{220B}"),
    rel("notin", "\u{2209}"),
    rel("perp", "\u{22A5}"),
    rel("parallel", "\u{2225}"),
    rel("mid", "\u{2223}"),
    rel("ll", "\u{226A}"),
    rel("gg", "\u{226B}"),
    rel("prec", "\u{227A}"),
    rel("succ", "\u{227B}"),
    rel("models", "\u{22A7}"),
    rel("vdash", "\u{22A2}"),
    rel("dashv", "\u{22A3}"),
    rel("asymp", "\u{224D}"),
    rel("leqslant", "\u{2A7D}").requires("amssymb"),
    rel("geqslant", "\u{2A7E}").requires("amssymb"),
    rel("lesssim", "\u{2272}").requires("amssymb"),
    rel("gtrsim", "\u{2273}").requires("amssymb"),
    rel("therefore", "\u{2234}").requires("amssymb"),
    rel("because", "\u{2235}").requires("amssymb"),
    // Arrows
    arrow("to", "\u{2192}"),
    arrow("rightarrow", "\u{2192}"),
    arrow("leftarrow", "\u{2190}"),
    arrow("gets", "\u{2190}"),
    arrow("leftrightarrow", "\u{2194}"),
    arrow("Rightarrow", "\u{21D2}"),
    arrow("Leftarrow", "\u{21D0}"),
    arrow("Leftrightarrow", "\u{21D4}"),
    arrow("longrightarrow", "\u{27F6}"),
    arrow("longleftarrow", "\u{27F5}"),
    arrow("Longrightarrow", "\u{27F9}"),
    arrow("mapsto", "\u{21A6}"),
    arrow("uparrow", "\u{2191}"),
    arrow("downarrow", "\u{2193}"),
    arrow("updownarrow", "\u{2195}"),
    arrow("nearrow", "\u{2197}"),
    arrow("searrow", "\u{2198}"),
    arrow("hookrightarrow", "\u{21AA}"),
    arrow("implies", "\u{27F9}").requires("amsmath"),
    arrow("iff", "\u{27FA}"),
    // Large operators
    big("sum", "\u{2211}"),
    big("prod", "\u{220F}"),
    big("coprod", "\u{2210}"),
    big("int", "\u{222B}"),
    big("iint", "\u{222C}").requires("amsmath"),
    big("iiint", "\u{222D}").requires("amsmath"),
    big("oint", "\u{222E}"),
    big("bigcup", "\u{22C3}"),
    big("bigcap", "\u{22C2}"),
    big("bigoplus", "\u{2A01}"),
    big("bigotimes", "\u{2A02}"),
    big("bigvee", "\u{22C1}"),
    big("bigwedge", "\u{22C0}"),
    big("bigsqcup", "\u{2A06}"),
    // Function names
    func("sin"),
    func("cos"),
    func("tan"),
    func("cot"),
    func("sec"),
    func("csc"),
    func("arcsin"),
    func("arccos"),
    func("arctan"),
    func("sinh"),
    func("cosh"),
    func("tanh"),
    func("coth"),
    func("log"),
    func("ln"),
    func("lg"),
    func("exp"),
    func("arg"),
    func("deg"),
    func("dim"),
    func("hom"),
    func("ker"),
    // Function names with limits
    func_lim("lim"),
    func_lim("liminf"),
    func_lim("limsup"),
    func_lim("max"),
    func_lim("min"),
    func_lim("sup"),
    func_lim("inf"),
    func_lim("det"),
    func_lim("gcd"),
    func_lim("Pr"),
    // Miscellaneous
    ord("infty", "\u{221E}"),
    ord("partial", "\u{2202}").alpha(),
    ord("nabla", "\u{2207}"),
    ord("forall", "\u{2200}"),
    ord("exists", "\u{2203}"),
    ord("neg", "\u{00AC}"),
    ord("lnot", "\u{00AC}"),
    ord("emptyset", "\u{2205}"),
    ord("varnothing", "\u{2205}").requires("amssymb"),
    ord("aleph", "\u{2135}").alpha(),
    ord("hbar", "\u{210F}").alpha(),
    ord("ell", "\u{2113}").alpha(),
    ord("wp", "\u{2118}").alpha(),
    ord("imath", "\u{0131}").alpha(),
    ord("jmath", "\u{0237}").alpha(),
    ord("Re", "\u{211C}"),
    ord("Im", "\u{2111}"),
    ord("angle", "\u{2220}"),
    ord("prime", "\u{2032}"),
    ord("top", "\u{22A4}"),
    ord("bot", "\u{22A5}"),
    ord("surd", "\u{221A}"),
    ord("square", "\u{25A1}").requires("amssymb"),
    ord("blacksquare", "\u{25A0}").requires("amssymb"),
    ord("triangle", "\u{25B3}"),
    ord("clubsuit", "\u{2663}"),
    ord("heartsuit", "\u{2661}"),
    // Delimiters
    delim("langle", "\u{27E8}"),
    delim("rangle", "\u{27E9}"),
    delim("lfloor", "\u{230A}"),
    delim("rfloor", "\u{230B}"),
    delim("lceil", "\u{2308}"),
    delim("rceil", "\u{2309}"),
    delim("vert", "|"),
    delim("Vert", "\u{2016}"),
    delim("lbrace", "{"),
    delim("rbrace", "}"),
    delim("backslash", "\\"),
    // Escaped characters
    delim("{", "{"),
    delim("}", "}"),
    delim("|", "\u{2016}"),
    SymbolInfo::new("_", "_", RM, Ordinary),
    SymbolInfo::new("#", "#", RM, Ordinary),
    SymbolInfo::new("&", "&", RM, Ordinary),
    SymbolInfo::new("%", "%", RM, Ordinary),
    SymbolInfo::new("$", "$", RM, Ordinary),
    // Dots
    SymbolInfo::new("ldots", "\u{2026}", SY, Dots),
    SymbolInfo::new("dots", "\u{2026}", SY, Dots),
    SymbolInfo::new("cdots", "\u{22EF}", SY, Dots),
    SymbolInfo::new("vdots", "\u{22EE}", SY, Dots),
    SymbolInfo::new("ddots", "\u{22F1}", SY, Dots),
    // Spaces
    space(",", 3),
    space(":", 4),
    space(">", 4),
    space(";", 5),
    space("!", -3),
    space(" ", 6),
    space("quad", 18),
    space("qquad", 36),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_greek() {
        let alpha = lookup_symbol("alpha").unwrap();
        assert_eq!(alpha.glyph, "\u{03B1}");
        assert_eq!(alpha.class, SymbolClass::Greek);
        assert!(alpha.alpha_like);
        assert_eq!(alpha.family, FontFamily::MathItalic);
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(lookup_symbol("bogusmacro").is_none());
        assert!(lookup_keyword("bogusmacro").is_none());
    }

    #[test]
    fn test_keyword_classification() {
        assert_eq!(lookup_keyword("frac"), Some(Keyword::Fraction(FracStyle::Frac)));
        assert_eq!(lookup_keyword("sqrt"), Some(Keyword::Sqrt));
        assert_eq!(lookup_keyword("mathbf"), Some(Keyword::Font(FontId::MathBf)));
        assert_eq!(lookup_keyword("bf"), Some(Keyword::OldFont(FontId::MathBf)));
        assert_eq!(
            lookup_keyword("hat"),
            Some(Keyword::Decoration(DecorationKind::Hat))
        );
        assert!(matches!(lookup_keyword("sum"), Some(Keyword::Symbol(s)) if s.name() == "sum"));
    }

    #[test]
    fn test_keyword_arity() {
        assert_eq!(lookup_keyword("frac").unwrap().arity(), 2);
        assert_eq!(lookup_keyword("sqrt").unwrap().arity(), 1);
        assert_eq!(lookup_keyword("alpha").unwrap().arity(), 0);
    }

    #[test]
    fn test_names_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for symbol in all_symbols() {
            assert!(seen.insert(symbol.name), "duplicate symbol {}", symbol.name);
        }
    }

    #[test]
    fn test_limits_and_requirements() {
        assert!(lookup_symbol("sum").unwrap().takes_limits());
        assert!(lookup_symbol("lim").unwrap().takes_limits());
        assert!(!lookup_symbol("sin").unwrap().takes_limits());
        assert_eq!(lookup_symbol("leqslant").unwrap().requires, Some("amssymb"));
        assert_eq!(lookup_symbol("quad").unwrap().space_mu, 18);
    }

    #[test]
    fn test_control_word() {
        assert!(lookup_symbol("alpha").unwrap().is_control_word());
        assert!(!lookup_symbol(",").unwrap().is_control_word());
    }

    #[test]
    fn test_symbol_ref_serde() {
        let alpha = SymbolRef::new("alpha").unwrap();
        let json = serde_json::to_string(&alpha).unwrap();
        assert_eq!(json, "\"alpha\"");
        let back: SymbolRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, alpha);
        assert!(serde_json::from_str::<SymbolRef>("\"nosuch\"").is_err());
    }
}
