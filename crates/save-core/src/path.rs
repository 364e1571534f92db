//! Dotted-path addressing over a `serde_json::Value` tree. Segments name
//! map keys or list indices; keys may contain arbitrary non-ASCII text.

use std::fmt;

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    EmptyPath,
    EmptySegment { position: usize },
    NotAContainer { segment: String },
    BadIndex { segment: String },
    IndexOutOfRange { index: usize, len: usize },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPath => write!(f, "empty path"),
            Self::EmptySegment { position } => {
                write!(f, "empty segment at position {position}")
            }
            Self::NotAContainer { segment } => {
                write!(f, "segment '{segment}' addresses a non-container value")
            }
            Self::BadIndex { segment } => {
                write!(f, "segment '{segment}' is not a valid list index")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "list index {index} out of range for length {len}")
            }
        }
    }
}

impl std::error::Error for PathError {}

pub fn parse_path(path: &str) -> Result<Vec<&str>, PathError> {
    if path.is_empty() {
        return Err(PathError::EmptyPath);
    }
    let segments: Vec<&str> = path.split('.').collect();
    for (position, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(PathError::EmptySegment { position });
        }
    }
    Ok(segments)
}

fn list_index(segment: &str, len: usize) -> Result<usize, PathError> {
    let index = segment.parse::<usize>().map_err(|_| PathError::BadIndex {
        segment: segment.to_string(),
    })?;
    if index >= len {
        return Err(PathError::IndexOutOfRange { index, len });
    }
    Ok(index)
}

pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = parse_path(path).ok()?;
    let mut node = root;
    for segment in segments {
        node = match node {
            Value::Object(map) => map.get(segment)?,
            Value::Array(list) => {
                let index = segment.parse::<usize>().ok()?;
                list.get(index)?
            }
            _ => return None,
        };
    }
    Some(node)
}

pub fn get_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let segments = parse_path(path).ok()?;
    let mut node = root;
    for segment in segments {
        node = match node {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(list) => {
                let index = segment.parse::<usize>().ok()?;
                list.get_mut(index)?
            }
            _ => return None,
        };
    }
    Some(node)
}

/// Walks to the parent of the final segment, creating intermediate maps
/// for missing keys. Existing scalars along the way are an error, never
/// silently overwritten.
fn descend_creating<'a>(
    root: &'a mut Value,
    segments: &[&str],
) -> Result<&'a mut Value, PathError> {
    let mut node = root;
    for segment in segments {
        node = match node {
            Value::Object(map) => map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(list) => {
                let index = list_index(segment, list.len())?;
                &mut list[index]
            }
            _ => {
                return Err(PathError::NotAContainer {
                    segment: segment.to_string(),
                })
            }
        };
        if node.is_null() {
            *node = Value::Object(Map::new());
        }
    }
    Ok(node)
}

/// Replaces (or creates) the value at `path`. A list index equal to the
/// list length appends, mirroring assignment-past-the-end in the command
/// producer's host environment.
pub fn set(root: &mut Value, path: &str, value: Value) -> Result<(), PathError> {
    let segments = parse_path(path)?;
    let (last, parents) = segments.split_last().expect("parse_path forbids empty");
    let parent = descend_creating(root, parents)?;
    match parent {
        Value::Object(map) => {
            map.insert((*last).to_string(), value);
            Ok(())
        }
        Value::Array(list) => {
            let index = last.parse::<usize>().map_err(|_| PathError::BadIndex {
                segment: (*last).to_string(),
            })?;
            if index < list.len() {
                list[index] = value;
            } else if index == list.len() {
                list.push(value);
            } else {
                return Err(PathError::IndexOutOfRange {
                    index,
                    len: list.len(),
                });
            }
            Ok(())
        }
        _ => Err(PathError::NotAContainer {
            segment: (*last).to_string(),
        }),
    }
}

/// Removes the key or index at `path`. Returns `false` when nothing was
/// there to remove.
pub fn delete(root: &mut Value, path: &str) -> Result<bool, PathError> {
    let segments = parse_path(path)?;
    let (last, parents) = segments.split_last().expect("parse_path forbids empty");

    let mut node = root;
    for segment in parents {
        node = match node {
            Value::Object(map) => match map.get_mut(*segment) {
                Some(child) => child,
                None => return Ok(false),
            },
            Value::Array(list) => {
                let index = match segment.parse::<usize>() {
                    Ok(index) => index,
                    Err(_) => return Ok(false),
                };
                match list.get_mut(index) {
                    Some(child) => child,
                    None => return Ok(false),
                }
            }
            _ => return Ok(false),
        };
    }

    match node {
        Value::Object(map) => Ok(map.remove(*last).is_some()),
        Value::Array(list) => {
            let index = match last.parse::<usize>() {
                Ok(index) => index,
                Err(_) => return Ok(false),
            };
            if index < list.len() {
                list.remove(index);
                Ok(true)
            } else {
                Ok(false)
            }
        }
        _ => Ok(false),
    }
}

/// Appends to the list at `path`, creating an empty list first when the
/// path is absent. An existing non-list value is an error.
pub fn push(root: &mut Value, path: &str, value: Value) -> Result<(), PathError> {
    let segments = parse_path(path)?;
    let (last, parents) = segments.split_last().expect("parse_path forbids empty");
    let parent = descend_creating(root, parents)?;
    let slot = match parent {
        Value::Object(map) => map
            .entry((*last).to_string())
            .or_insert_with(|| Value::Array(Vec::new())),
        Value::Array(list) => {
            let index = list_index(last, list.len())?;
            &mut list[index]
        }
        _ => {
            return Err(PathError::NotAContainer {
                segment: (*last).to_string(),
            })
        }
    };
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(list) => {
            list.push(value);
            Ok(())
        }
        _ => Err(PathError::NotAContainer {
            segment: (*last).to_string(),
        }),
    }
}
