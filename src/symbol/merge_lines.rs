use super::feature::SymbolFeature;
use crate::geometry::Point;
use std::collections::{BTreeMap, HashMap};

type PartId = (usize, usize);

/// Joins line parts that carry the same text and share an endpoint, so that a road
/// split into many pieces gets labelled as one line. Features without text come first,
/// untouched; features whose every part was merged into another one are dropped.
pub fn merge_lines(features: Vec<SymbolFeature>) -> Vec<SymbolFeature> {
    let mut left_index: HashMap<String, PartId> = HashMap::new();
    let mut right_index: HashMap<String, PartId> = HashMap::new();
    let mut merged: BTreeMap<usize, BTreeMap<usize, Option<Vec<Point>>>> = BTreeMap::new();
    let mut no_text = Vec::new();
    let mut with_text = Vec::new();

    for (k, mut feature) in features.into_iter().enumerate() {
        let Some(text) = feature.text_key() else {
            no_text.push(feature);
            continue;
        };

        let geometry = std::mem::take(&mut feature.geometry);
        for (c, mut part) in geometry.into_iter().enumerate() {
            let (Some(first), Some(last)) = (part.first(), part.last()) else {
                continue;
            };
            // Left-to-right orientation for every part.
            if first.x > last.x {
                part.reverse();
            }
            let left_key = key(&text, &part, false);
            let right_key = key(&text, &part, true);

            let join_right = right_index.get(&left_key).copied();
            let join_left = left_index.get(&right_key).copied();

            match (join_right, join_left) {
                (Some(a), Some(b)) if a != b => {
                    // Parts on both sides: splice all three into the left one.
                    left_index.remove(&right_key);
                    let right_part = take_part(&mut merged, b).unwrap_or_default();
                    right_index.remove(&left_key);

                    let mut spliced = part;
                    spliced.extend(right_part.into_iter().skip(1));
                    if let Some(left_part) = part_mut(&mut merged, a) {
                        left_part.pop();
                        left_part.extend(spliced);
                        let new_right = key(&text, left_part, true);
                        right_index.retain(|_, id| *id != b);
                        right_index.insert(new_right, a);
                    }
                }
                (Some(a), _) => {
                    right_index.remove(&left_key);
                    right_index.insert(right_key, a);
                    if let Some(left_part) = part_mut(&mut merged, a) {
                        left_part.pop();
                        left_part.extend(part);
                    }
                }
                (None, Some(b)) => {
                    left_index.remove(&right_key);
                    left_index.insert(left_key, b);
                    if let Some(right_part) = part_mut(&mut merged, b) {
                        part.pop();
                        part.append(right_part);
                        *right_part = part;
                    }
                }
                (None, None) => {
                    merged.entry(k).or_default().insert(c, Some(part));
                    left_index.insert(left_key, (k, c));
                    right_index.insert(right_key, (k, c));
                }
            }
        }
        with_text.push((k, feature));
    }

    let mut out = no_text;
    for (k, mut feature) in with_text {
        let Some(parts) = merged.remove(&k) else {
            continue;
        };
        feature.geometry = parts.into_values().flatten().collect();
        if !feature.geometry.is_empty() {
            out.push(feature);
        }
    }
    out
}

fn key(text: &str, part: &[Point], on_right: bool) -> String {
    let point = if on_right { part.last() } else { part.first() };
    let point = point.copied().unwrap_or_default();
    format!("{text}:{}:{}", point.x, point.y)
}

fn part_mut(merged: &mut BTreeMap<usize, BTreeMap<usize, Option<Vec<Point>>>>, id: PartId) -> Option<&mut Vec<Point>> {
    merged.get_mut(&id.0)?.get_mut(&id.1)?.as_mut()
}

fn take_part(merged: &mut BTreeMap<usize, BTreeMap<usize, Option<Vec<Point>>>>, id: PartId) -> Option<Vec<Point>> {
    merged.get_mut(&id.0)?.get_mut(&id.1)?.take()
}
