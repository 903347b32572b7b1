#![allow(dead_code)]

use std::fs;
use std::path::Path;

pub const SAMPLES: usize = 120;

fn repeat(parts: &[(char, usize)]) -> String {
    parts
        .iter()
        .flat_map(|&(c, n)| std::iter::repeat_n(c, n))
        .collect()
}

/// Seven genes with known relations among the four balanced ones:
///
/// | row | id   | profile                        | category  |
/// |-----|------|--------------------------------|-----------|
/// | 0   | X    | 60 low, 60 high                | balanced  |
/// | 1   | LOW1 | all low                        | low       |
/// | 2   | Y    | copy of X                      | balanced  |
/// | 3   | Z    | 30 low, 90 high (X high ⇒ Z high) | balanced |
/// | 4   | HI1  | all high                       | high      |
/// | 5   | W    | complement of X                | balanced  |
/// | 6   | AMB  | all ambiguous                  | no range  |
pub fn rows() -> Vec<(&'static str, String)> {
    vec![
        ("X", repeat(&[('0', 60), ('2', 60)])),
        ("LOW1", repeat(&[('0', SAMPLES)])),
        ("Y", repeat(&[('0', 60), ('2', 60)])),
        ("Z", repeat(&[('0', 30), ('2', 90)])),
        ("HI1", repeat(&[('2', SAMPLES)])),
        ("W", repeat(&[('2', 60), ('0', 60)])),
        ("AMB", repeat(&[('1', SAMPLES)])),
    ]
}

/// Expected `(row a, row b, code)` triples, sorted.
pub const EXPECTED_ROW_RELATIONS: [(usize, usize, u8); 6] = [
    (0, 2, 5),
    (0, 3, 3),
    (0, 5, 6),
    (2, 3, 3),
    (2, 5, 6),
    (3, 5, 1),
];

/// The same relations addressed by balanced index (X=0, Y=1, Z=2, W=3).
pub const EXPECTED_DENSE_RELATIONS: [(usize, usize, u8); 6] = [
    (0, 1, 5),
    (0, 2, 3),
    (0, 3, 6),
    (1, 2, 3),
    (1, 3, 6),
    (2, 3, 1),
];

pub fn write_bit_vectors(path: &Path) {
    let mut text = String::from("ProbeID\tName\tBitVector\n");
    for (id, bits) in rows() {
        text.push_str(&format!("{id}\t{id} gene\t{bits}\n"));
    }
    fs::write(path, text).expect("write bit-vector file");
}

/// Relation rows of a sparse network file as `(a, b, code, score, counts)`.
pub fn sparse_relations(text: &str) -> Vec<(usize, usize, u8, String, String)> {
    let mut lines = text.lines();
    lines
        .by_ref()
        .find(|line| line.starts_with("gene_a\t"))
        .expect("column header");
    lines
        .map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            assert_eq!(fields.len(), 5, "relation row: {line}");
            (
                fields[0].parse().expect("gene a"),
                fields[1].parse().expect("gene b"),
                fields[2].parse().expect("code"),
                fields[3].to_string(),
                fields[4].to_string(),
            )
        })
        .collect()
}
