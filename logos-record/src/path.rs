//! Path addressing inside a record document.
//!
//! Paths are dot-separated keys with optional bracket indexes:
//! `"user.addresses[0].city"`, `"list.1"`. An empty path (or `None`)
//! addresses the whole document.

use serde_json::{Map, Value};

/// One step of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Object key, or array index when the container is an array and the key is numeric
    Key(String),
    /// Bracket index, always an array position
    Index(usize),
}

/// Split a path into segments.
pub fn parse(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(open) => (&part[..open], &part[open..]),
            None => (part, ""),
        };
        if !key.is_empty() {
            segments.push(Segment::Key(key.to_string()));
        }
        while let Some(stripped) = rest.strip_prefix('[') {
            let Some(close) = stripped.find(']') else {
                segments.push(Segment::Key(stripped.to_string()));
                break;
            };
            let inner = &stripped[..close];
            match inner.parse() {
                Ok(index) => segments.push(Segment::Index(index)),
                Err(_) => segments.push(Segment::Key(inner.to_string())),
            }
            rest = &stripped[close + 1..];
        }
    }
    segments
}

/// Value at `path`, or the whole document when `path` is `None`/empty.
pub fn get<'a>(doc: &'a Value, path: Option<&str>) -> Option<&'a Value> {
    let path = match path {
        Some(p) if !p.is_empty() => p,
        _ => return Some(doc),
    };

    let mut current = doc;
    for segment in parse(path) {
        current = match (&segment, current) {
            (Segment::Index(i), Value::Array(arr)) => arr.get(*i)?,
            (Segment::Key(k), Value::Array(arr)) => arr.get(k.parse::<usize>().ok()?)?,
            (Segment::Key(k), Value::Object(map)) => map.get(k)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `value` at `path`, replacing the document when `path` is `None`/empty.
///
/// Missing containers are created along the way. Indexes past the end of an
/// array pad it with `null`.
pub fn set(doc: &mut Value, path: Option<&str>, value: Value) {
    let segments = match path {
        Some(p) if !p.is_empty() => parse(p),
        _ => Vec::new(),
    };
    if segments.is_empty() {
        *doc = value;
        return;
    }

    let mut current = doc;
    for (i, segment) in segments.iter().enumerate() {
        let slot = slot_mut(current, segment);
        if i + 1 == segments.len() {
            *slot = value;
            return;
        }
        let wants_array = matches!(segments[i + 1], Segment::Index(_));
        let fits = match (&*slot, &segments[i + 1]) {
            (Value::Array(_), _) => true,
            (Value::Object(_), Segment::Key(_)) => true,
            _ => false,
        };
        if !fits {
            *slot = if wants_array {
                Value::Array(Vec::new())
            } else {
                Value::Object(Map::new())
            };
        }
        current = slot;
    }
}

/// Mutable slot for `segment` inside `container`, reshaping the container if needed.
fn slot_mut<'a>(container: &'a mut Value, segment: &Segment) -> &'a mut Value {
    let index = match (segment, &*container) {
        (Segment::Index(i), _) => Some(*i),
        (Segment::Key(k), Value::Array(_)) => k.parse::<usize>().ok(),
        _ => None,
    };

    match index {
        Some(i) => {
            if !container.is_array() {
                *container = Value::Array(Vec::new());
            }
            let arr = match container {
                Value::Array(arr) => arr,
                _ => unreachable!("container was just made an array"),
            };
            if arr.len() <= i {
                arr.resize(i + 1, Value::Null);
            }
            &mut arr[i]
        }
        None => {
            let key = match segment {
                Segment::Key(k) => k.clone(),
                Segment::Index(i) => i.to_string(),
            };
            if !container.is_object() {
                *container = Value::Object(Map::new());
            }
            match container {
                Value::Object(map) => map.entry(key).or_insert(Value::Null),
                _ => unreachable!("container was just made an object"),
            }
        }
    }
}
