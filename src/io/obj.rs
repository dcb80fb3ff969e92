// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A minimal Wavefront OBJ reader/writer: `v`/`f` lines only. No normals,
//! texture coordinates, materials, or groups -- the repair pipeline only
//! needs a triangle soup in and a triangle soup out.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use glam::DVec3;

use crate::soup::PolygonSoup;

pub fn load(path: &Path) -> Result<PolygonSoup> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut points = Vec::new();
    let mut polygons = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading {} at line {}", path.display(), line_no + 1))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        match fields.next() {
            Some("v") => {
                let coords: Vec<f64> = fields
                    .take(3)
                    .map(|f| f.parse::<f64>())
                    .collect::<std::result::Result<_, _>>()
                    .with_context(|| format!("parsing vertex at {}:{}", path.display(), line_no + 1))?;
                if coords.len() != 3 {
                    bail!("malformed vertex at {}:{}", path.display(), line_no + 1);
                }
                points.push(DVec3::new(coords[0], coords[1], coords[2]));
            }
            Some("f") => {
                let mut face = Vec::new();
                for token in fields {
                    // OBJ faces may carry "/vt/vn" suffixes; only the vertex
                    // index before the first slash matters here.
                    let vertex_token = token.split('/').next().unwrap_or(token);
                    let idx: i64 = vertex_token
                        .parse()
                        .with_context(|| format!("parsing face index at {}:{}", path.display(), line_no + 1))?;
                    // Negative indices count back from the end of the point list.
                    let zero_based = if idx > 0 { idx - 1 } else { points.len() as i64 + idx };
                    if zero_based < 0 {
                        bail!("face index out of range at {}:{}", path.display(), line_no + 1);
                    }
                    face.push(zero_based as u32);
                }
                if face.len() < 3 {
                    bail!("face with fewer than 3 vertices at {}:{}", path.display(), line_no + 1);
                }
                polygons.push(face);
            }
            _ => continue,
        }
    }

    Ok(PolygonSoup { points, polygons })
}

pub fn save(path: &Path, soup: &PolygonSoup) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    for p in &soup.points {
        writeln!(writer, "v {} {} {}", p.x, p.y, p.z)?;
    }
    for poly in &soup.polygons {
        write!(writer, "f")?;
        for &idx in poly {
            write!(writer, " {}", idx + 1)?;
        }
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_tetrahedron() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tet.obj");

        let soup = PolygonSoup {
            points: vec![DVec3::ZERO, DVec3::X, DVec3::Y, DVec3::Z],
            polygons: vec![vec![0, 2, 1], vec![0, 1, 3], vec![1, 2, 3], vec![2, 0, 3]],
        };
        save(&path, &soup).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.points.len(), 4);
        assert_eq!(loaded.polygons.len(), 4);
        assert_eq!(loaded.polygons[0], vec![0, 2, 1]);
    }

    #[test]
    fn negative_face_indices_count_from_the_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("neg.obj");
        std::fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n").unwrap();

        let soup = load(&path).unwrap();
        assert_eq!(soup.polygons, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn rejects_degenerate_faces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.obj");
        std::fs::write(&path, "v 0 0 0\nv 1 0 0\nf 1 2\n").unwrap();
        assert!(load(&path).is_err());
    }
}
