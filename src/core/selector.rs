//! Entity selectors and their filter clauses.
//!
//! A selector has a core (`@s`, `@a`, `@e`, `@p`, `@initiator`), an optional
//! count limit and any number of narrowing clauses. Merging two selectors only
//! ever appends clauses, so a merged selector never matches more than either
//! input.

use super::coord::Coord;
use super::range::Range;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Core {
    S,
    A,
    E,
    P,
    I,
}

impl Core {
    pub fn parse(text: &str) -> Option<Core> {
        match text {
            "@s" => Some(Core::S),
            "@a" => Some(Core::A),
            "@e" => Some(Core::E),
            "@p" => Some(Core::P),
            "@i" | "@initiator" => Some(Core::I),
            _ => None,
        }
    }
}

impl fmt::Display for Core {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Core::S => "@s",
            Core::A => "@a",
            Core::E => "@e",
            Core::P => "@p",
            Core::I => "@initiator",
        };
        write!(f, "{}", s)
    }
}

/// A possibly negated string clause such as `tag=!busy`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Named {
    pub value: String,
    pub not: bool,
}

impl Named {
    pub fn parse(text: &str) -> Named {
        let text = text.trim();
        let (not, value) = match text.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        Named {
            value: value.trim_matches('"').to_string(),
            not,
        }
    }

    fn section(&self, key: &str) -> String {
        let bang = if self.not { "!" } else { "" };
        if self.value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':' || c == '.') {
            format!("{}={}{}", key, bang, self.value)
        } else {
            format!("{}={}\"{}\"", key, bang, self.value)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreCheck {
    pub objective: String,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockCheck {
    pub x: Coord,
    pub y: Coord,
    pub z: Coord,
    pub block: String,
    pub data: Option<i32>,
}

impl BlockCheck {
    pub fn new(x: Coord, y: Coord, z: Coord, block: impl Into<String>, data: Option<i32>) -> Self {
        Self {
            x,
            y,
            z,
            block: block.into(),
            data: data.filter(|d| *d != 0),
        }
    }
}

impl fmt::Display for BlockCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "detect {} {} {} {} {}",
            self.x,
            self.y,
            self.z,
            self.block,
            self.data.unwrap_or(0)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HasItem {
    pub item: String,
    pub data: Option<i32>,
    pub location: Option<String>,
    pub slot: Option<i32>,
    pub quantity: Option<Range>,
}

impl HasItem {
    fn parse(body: &str) -> HasItem {
        let mut entry = HasItem {
            item: String::new(),
            data: None,
            location: None,
            slot: None,
            quantity: None,
        };
        for part in split_top_level(body.trim_start_matches('{').trim_end_matches('}')) {
            let Some((key, value)) = part.split_once('=') else { continue };
            let value = value.trim();
            match key.trim() {
                "item" => entry.item = value.to_string(),
                "data" => entry.data = value.parse().ok(),
                "location" => entry.location = Some(value.to_string()),
                "slot" => entry.slot = value.parse().ok(),
                "quantity" => entry.quantity = Range::parse(value),
                _ => {}
            }
        }
        entry
    }
}

impl fmt::Display for HasItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec![format!("item={}", self.item)];
        if let Some(data) = self.data {
            parts.push(format!("data={}", data));
        }
        if let Some(location) = &self.location {
            parts.push(format!("location={}", location));
        }
        if let Some(slot) = self.slot {
            parts.push(format!("slot={}", slot));
        }
        if let Some(quantity) = &self.quantity {
            parts.push(format!("quantity={}", quantity));
        }
        write!(f, "{{{}}}", parts.join(","))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Area {
    pub x: Option<Coord>,
    pub y: Option<Coord>,
    pub z: Option<Coord>,
    pub radius: Option<f32>,
    pub radius_min: Option<f32>,
}

impl Area {
    fn is_empty(&self) -> bool {
        self.x.is_none()
            && self.y.is_none()
            && self.z.is_none()
            && self.radius.is_none()
            && self.radius_min.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selector {
    pub core: Core,
    pub count: Option<i32>,
    pub types: Vec<Named>,
    pub names: Vec<Named>,
    pub families: Vec<Named>,
    pub tags: Vec<Named>,
    pub scores: Vec<ScoreCheck>,
    pub has_items: Vec<HasItem>,
    pub area: Area,
    pub block_check: Option<BlockCheck>,
    /// Position used in place of `~ ~ ~` when this selector becomes an execute prefix.
    pub offset: Option<(Coord, Coord, Coord)>,
    /// Clauses carried through verbatim.
    pub extra: Vec<String>,
}

impl Selector {
    pub fn new(core: Core) -> Self {
        Self {
            core,
            count: None,
            types: Vec::new(),
            names: Vec::new(),
            families: Vec::new(),
            tags: Vec::new(),
            scores: Vec::new(),
            has_items: Vec::new(),
            area: Area::default(),
            block_check: None,
            offset: None,
            extra: Vec::new(),
        }
    }

    pub fn self_selector() -> Self {
        Self::new(Core::S)
    }

    pub fn has_clauses(&self) -> bool {
        self.count.is_some()
            || !self.types.is_empty()
            || !self.names.is_empty()
            || !self.families.is_empty()
            || !self.tags.is_empty()
            || !self.scores.is_empty()
            || !self.has_items.is_empty()
            || !self.area.is_empty()
            || !self.extra.is_empty()
    }

    /// Whether this selector has to be re-expressed as `@s` through an execute
    /// prefix before it can be the implicit subject of a command.
    pub fn needs_align(&self) -> bool {
        self.core != Core::S || self.has_clauses() || self.block_check.is_some() || self.offset.is_some()
    }

    pub fn selects_multiple(&self) -> bool {
        matches!(self.core, Core::A | Core::E) && self.count != Some(1)
    }

    pub fn with_score(mut self, objective: impl Into<String>, range: Range) -> Self {
        self.scores.push(ScoreCheck {
            objective: objective.into(),
            range,
        });
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(Named {
            value: tag.into(),
            not: false,
        });
        self
    }

    /// Narrow this selector by every clause of `other`.
    pub fn merge(&mut self, other: &Selector) {
        if self.core == Core::S && other.core != Core::S {
            self.core = other.core;
        }
        self.count = match (self.count, other.count) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.types.extend(other.types.iter().cloned());
        self.names.extend(other.names.iter().cloned());
        self.families.extend(other.families.iter().cloned());
        self.tags.extend(other.tags.iter().cloned());
        self.scores.extend(other.scores.iter().cloned());
        self.has_items.extend(other.has_items.iter().cloned());
        if self.area.is_empty() {
            self.area = other.area.clone();
        }
        if other.block_check.is_some() {
            self.block_check = other.block_check.clone();
        }
        if other.offset.is_some() {
            self.offset = other.offset;
        }
        self.extra.extend(other.extra.iter().cloned());
    }

    /// The selector as a target string, without block checks or offsets.
    pub fn target(&self) -> String {
        self.to_string()
    }

    /// `execute <selector> <x y z> [detect ...] ` ready to have a command appended.
    pub fn as_prefix(&self) -> String {
        let (x, y, z) = self.offset.unwrap_or((Coord::HERE, Coord::HERE, Coord::HERE));
        match &self.block_check {
            Some(check) => format!("execute {} {} {} {} {} ", self, x, y, z, check),
            None => format!("execute {} {} {} {} ", self, x, y, z),
        }
    }

    pub fn parse(text: &str) -> Option<Selector> {
        let text = text.trim();
        let (core_text, body) = match text.find('[') {
            Some(open) => {
                let close = text.rfind(']')?;
                if close < open {
                    return None;
                }
                (&text[..open], Some(&text[open + 1..close]))
            }
            None => (text, None),
        };

        let mut selector = Selector::new(Core::parse(core_text)?);
        let Some(body) = body else {
            return Some(selector);
        };

        for clause in split_top_level(body) {
            let Some((key, value)) = clause.split_once('=') else {
                selector.extra.push(clause.to_string());
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "type" => selector.types.push(Named::parse(value)),
                "name" => selector.names.push(Named::parse(value)),
                "family" => selector.families.push(Named::parse(value)),
                "tag" => selector.tags.push(Named::parse(value)),
                "c" => selector.count = value.parse().ok(),
                "x" => selector.area.x = Coord::parse(value),
                "y" => selector.area.y = Coord::parse(value),
                "z" => selector.area.z = Coord::parse(value),
                "r" => selector.area.radius = value.parse().ok(),
                "rm" => selector.area.radius_min = value.parse().ok(),
                "scores" => {
                    let inner = value.trim_start_matches('{').trim_end_matches('}');
                    for score in split_top_level(inner) {
                        if let Some((objective, range)) = score.split_once('=') {
                            if let Some(range) = Range::parse(range.trim()) {
                                selector.scores.push(ScoreCheck {
                                    objective: objective.trim().to_string(),
                                    range,
                                });
                            }
                        }
                    }
                }
                "hasitem" => {
                    if let Some(list) = value.strip_prefix('[') {
                        let list = list.trim_end_matches(']');
                        for entry in split_top_level(list) {
                            selector.has_items.push(HasItem::parse(entry));
                        }
                    } else {
                        selector.has_items.push(HasItem::parse(value));
                    }
                }
                _ => selector.extra.push(clause.trim().to_string()),
            }
        }

        Some(selector)
    }

    /// Implicit conversion from text: `""` is `@s`, `@x[...]` is parsed,
    /// `name:type` and bare names select entities by name.
    pub fn from_text(text: &str) -> Option<Selector> {
        let text = text.trim();
        if text.is_empty() {
            return Some(Selector::self_selector());
        }
        if text.starts_with('@') {
            return Selector::parse(text);
        }
        let mut selector = Selector::new(Core::E);
        match text.split_once(':') {
            Some((name, entity_type)) if !name.is_empty() && !entity_type.is_empty() => {
                selector.names.push(Named { value: name.to_string(), not: false });
                selector.types.push(Named { value: entity_type.to_string(), not: false });
            }
            _ => selector.names.push(Named { value: text.to_string(), not: false }),
        }
        Some(selector)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        parts.extend(self.types.iter().map(|t| t.section("type")));
        parts.extend(self.names.iter().map(|n| n.section("name")));
        parts.extend(self.families.iter().map(|n| n.section("family")));
        parts.extend(self.tags.iter().map(|t| t.section("tag")));
        if !self.scores.is_empty() {
            let scores: Vec<String> = self
                .scores
                .iter()
                .map(|s| format!("{}={}", s.objective, s.range))
                .collect();
            parts.push(format!("scores={{{}}}", scores.join(",")));
        }
        match self.has_items.len() {
            0 => {}
            1 => parts.push(format!("hasitem={}", self.has_items[0])),
            _ => {
                let items: Vec<String> = self.has_items.iter().map(|i| i.to_string()).collect();
                parts.push(format!("hasitem=[{}]", items.join(",")));
            }
        }
        if let Some(x) = &self.area.x {
            parts.push(format!("x={}", x));
        }
        if let Some(y) = &self.area.y {
            parts.push(format!("y={}", y));
        }
        if let Some(z) = &self.area.z {
            parts.push(format!("z={}", z));
        }
        if let Some(r) = self.area.radius {
            parts.push(format!("r={}", r));
        }
        if let Some(rm) = self.area.radius_min {
            parts.push(format!("rm={}", rm));
        }
        if let Some(count) = self.count {
            parts.push(format!("c={}", count));
        }
        parts.extend(self.extra.iter().cloned());

        if parts.is_empty() {
            write!(f, "{}", self.core)
        } else {
            write!(f, "{}[{}]", self.core, parts.join(","))
        }
    }
}

/// Split on commas that are not nested inside `{}`, `[]` or quotes.
pub(crate) fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quoted = false;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            '{' | '[' if !quoted => depth += 1,
            '}' | ']' if !quoted => depth -= 1,
            ',' if !quoted && depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = text[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    parts.retain(|p| !p.is_empty());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        let text = "@e[type=zombie,tag=!busy,scores={hp=1..5,lvl=3},c=2]";
        let selector = Selector::parse(text).unwrap();
        assert_eq!(selector.core, Core::E);
        assert_eq!(selector.count, Some(2));
        assert_eq!(selector.scores.len(), 2);
        assert!(selector.tags[0].not);
        assert_eq!(selector.to_string(), text);
    }

    #[test]
    fn test_hasitem_list() {
        let selector =
            Selector::parse("@a[hasitem=[{item=apple,quantity=1..},{item=stick,slot=0}]]").unwrap();
        assert_eq!(selector.has_items.len(), 2);
        assert_eq!(selector.has_items[1].slot, Some(0));
        assert_eq!(
            selector.to_string(),
            "@a[hasitem=[{item=apple,quantity=1..},{item=stick,slot=0}]]"
        );
    }

    #[test]
    fn test_needs_align() {
        assert!(!Selector::self_selector().needs_align());
        assert!(Selector::new(Core::A).needs_align());
        assert!(Selector::self_selector().with_tag("x").needs_align());
    }

    #[test]
    fn test_merge_only_narrows() {
        let mut a = Selector::parse("@e[type=cow,c=5]").unwrap();
        let b = Selector::parse("@s[tag=fed,c=2]").unwrap();
        a.merge(&b);
        assert_eq!(a.core, Core::E);
        assert_eq!(a.count, Some(2));
        assert_eq!(a.to_string(), "@e[type=cow,tag=fed,c=2]");
    }

    #[test]
    fn test_prefix_with_block_check() {
        let mut s = Selector::self_selector();
        s.block_check = Some(BlockCheck::new(Coord::HERE, Coord::relative(-1.0), Coord::HERE, "stone", None));
        assert_eq!(s.as_prefix(), "execute @s ~ ~ ~ detect ~ ~-1 ~ stone 0 ");
    }

    #[test]
    fn test_from_text() {
        assert_eq!(Selector::from_text("").unwrap(), Selector::self_selector());
        assert_eq!(Selector::from_text("bob:villager").unwrap().to_string(), "@e[type=villager,name=bob]");
        assert_eq!(Selector::from_text("Big Bob").unwrap().to_string(), "@e[name=\"Big Bob\"]");
    }
}
