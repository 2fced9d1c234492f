//! # Binary Container
//!
//! One table serializes to one Deflate-compressed archive:
//!
//! ```text
//! <stamp>.table     bincode metadata: identities, scalar columns, shapes
//! <index>.bin       raw little-endian f64 row-major dump, one per
//!                   non-resident multidimensional column
//! ```
//!
//! Resident multidimensional buffers travel inline in the metadata entry;
//! non-resident ones stream into their own archive entry chunk by chunk, so
//! writing a column larger than free memory never materializes it. The
//! in-memory table is untouched by a write.
//!
//! Reading decodes the metadata first, then per auxiliary column extracts
//! the one `.bin` entry to a process-scoped directory under the configured
//! temp root, maps it read-only, chunk-copies it into a fresh non-resident
//! backing, and deletes the extracted file. A loaded table always starts a
//! fresh lineage.

use eyre::{bail, ensure, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::cell::Cell;
use crate::column::{Column, ColumnVariant, FloatColumn, IntColumn, MixedColumn, MultiDimColumn};
use crate::context::Context;
use crate::error::FormatError;
use crate::index::RowIndex;
use crate::residency::NdBuffer;
use crate::table::Table;

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct TableMeta {
    version: u32,
    length: usize,
    rowids: Vec<u64>,
    columns: Vec<ColumnMeta>,
}

#[derive(Serialize, Deserialize)]
struct ColumnMeta {
    name: String,
    kind: ColumnKindMeta,
}

#[derive(Serialize, Deserialize)]
enum ColumnKindMeta {
    Mixed {
        cells: Vec<Cell>,
    },
    Int {
        values: Vec<i64>,
    },
    Float {
        values: Vec<f64>,
    },
    MultiDim {
        shape: Vec<usize>,
        default_nan: bool,
        // Absent in archives written before labels existed.
        labels: Option<Vec<Option<Vec<String>>>>,
        data: MdimData,
    },
}

#[derive(Serialize, Deserialize)]
enum MdimData {
    Inline(Vec<f64>),
    Aux(String),
}

/// Writes `table` as a compressed archive at `path`. Residency states are
/// left as they are.
pub fn write_container(table: &Table, path: &Path) -> Result<()> {
    let cfg = table.context().config();
    let file = File::create(path)
        .wrap_err_with(|| format!("failed to create container '{}'", path.display()))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut columns = Vec::new();
    for (idx, (name, col)) in table.columns().enumerate() {
        let kind = match col {
            Column::Mixed(c) => ColumnKindMeta::Mixed {
                cells: c.cells().to_vec(),
            },
            Column::Int(c) => ColumnKindMeta::Int {
                values: c.values().to_vec(),
            },
            Column::Float(c) => ColumnKindMeta::Float {
                values: c.values().to_vec(),
            },
            Column::MultiDim(c) => {
                let guard = c.buffer().lock();
                let data = if guard.loaded() {
                    MdimData::Inline(guard.as_slice().to_vec())
                } else {
                    let aux = format!("{}.bin", idx);
                    debug!(entry = %aux, bytes = guard.byte_size(), "streaming column");
                    zip.start_file(aux.as_str(), options.large_file(true))?;
                    let chunk = cfg.chunk_rows(guard.bytes_per_row().max(1)).max(1)
                        * guard.cell_len().max(1);
                    let src = guard.as_slice();
                    let mut bytes = Vec::with_capacity(chunk * 8);
                    for part in src.chunks(chunk) {
                        bytes.clear();
                        for v in part {
                            bytes.extend_from_slice(&v.to_le_bytes());
                        }
                        zip.write_all(&bytes)?;
                    }
                    MdimData::Aux(aux)
                };
                ColumnKindMeta::MultiDim {
                    shape: c.shape().to_vec(),
                    default_nan: c.default_nan(),
                    labels: Some(
                        (0..c.shape().len())
                            .map(|axis| c.labels(axis).map(|l| l.to_vec()))
                            .collect(),
                    ),
                    data,
                }
            }
        };
        columns.push(ColumnMeta {
            name: name.to_string(),
            kind,
        });
    }

    let meta = TableMeta {
        version: FORMAT_VERSION,
        length: table.len(),
        rowids: table.rowindex().ids().to_vec(),
        columns,
    };
    let meta_name = format!("{}.table", table.id().raw());
    debug!(entry = %meta_name, "writing metadata");
    zip.start_file(meta_name.as_str(), options)?;
    zip.write_all(&bincode::serialize(&meta)?)?;
    zip.finish()?;
    Ok(())
}

/// Loads a table from a container written by [`write_container`]. Columns
/// stored as auxiliary entries come back non-resident; the loaded table
/// starts a fresh lineage.
pub fn read_container(ctx: &Arc<Context>, path: &Path) -> Result<Table> {
    let cfg = ctx.config();
    let file = File::open(path)
        .wrap_err_with(|| format!("failed to open container '{}'", path.display()))?;
    let mut zip = ZipArchive::new(BufReader::new(file))?;

    let meta_name = match zip
        .file_names()
        .find(|n| n.ends_with(".table"))
        .map(str::to_string)
    {
        Some(name) => name,
        None => bail!(FormatError {
            reason: "no table metadata entry".to_string(),
        }),
    };
    debug!(entry = %meta_name, "reading metadata");
    let meta: TableMeta = {
        let entry = zip.by_name(&meta_name)?;
        match bincode::deserialize_from(entry) {
            Ok(meta) => meta,
            Err(err) => bail!(FormatError {
                reason: format!("undecodable metadata: {}", err),
            }),
        }
    };

    ensure!(
        meta.rowids.len() == meta.length,
        FormatError {
            reason: format!(
                "{} row identities for {} rows",
                meta.rowids.len(),
                meta.length
            ),
        }
    );

    let extract_dir = cfg
        .tmp_dir
        .join(format!("coldeck-extract-{}", std::process::id()));
    std::fs::create_dir_all(&extract_dir)
        .wrap_err_with(|| format!("failed to create '{}'", extract_dir.display()))?;

    let stamp = ctx.next_stamp();
    let rowindex = RowIndex::from_ids(meta.rowids);
    let mut cols = indexmap::IndexMap::new();
    for column in meta.columns {
        let col = match column.kind {
            ColumnKindMeta::Mixed { cells } => {
                check_count(&column.name, cells.len(), meta.length)?;
                Column::Mixed(MixedColumn::from_cells(rowindex.clone(), stamp, cells))
            }
            ColumnKindMeta::Int { values } => {
                check_count(&column.name, values.len(), meta.length)?;
                Column::Int(IntColumn::from_values(rowindex.clone(), stamp, values))
            }
            ColumnKindMeta::Float { values } => {
                check_count(&column.name, values.len(), meta.length)?;
                Column::Float(FloatColumn::from_values(rowindex.clone(), stamp, values))
            }
            ColumnKindMeta::MultiDim {
                shape,
                default_nan,
                labels,
                data,
            } => {
                let cell_len: usize = shape.iter().product();
                let rows = meta.length;
                let buf = match data {
                    MdimData::Inline(values) => {
                        if values.len() != rows * cell_len {
                            bail!(FormatError {
                                reason: format!(
                                    "column '{}' holds {} values, expected {}",
                                    column.name,
                                    values.len(),
                                    rows * cell_len
                                ),
                            });
                        }
                        let mut buf = NdBuffer::new_resident(rows, cell_len, 0.0);
                        buf.as_mut_slice().copy_from_slice(&values);
                        buf
                    }
                    MdimData::Aux(aux) => {
                        extract_aux(&mut zip, &aux, &extract_dir, rows, cell_len, &cfg)?
                    }
                };
                Column::MultiDim(MultiDimColumn::from_buffer(
                    ctx.clone(),
                    rowindex.clone(),
                    stamp,
                    &shape,
                    default_nan,
                    labels.unwrap_or_else(|| vec![None; shape.len()]),
                    buf,
                ))
            }
        };
        cols.insert(column.name, col);
    }
    let _ = std::fs::remove_dir(&extract_dir);
    Ok(Table::from_parts(
        ctx.clone(),
        stamp,
        rowindex,
        cols,
        ColumnVariant::Mixed,
    ))
}

/// Rejects a scalar column whose stored value count disagrees with the
/// table length.
fn check_count(name: &str, got: usize, expected: usize) -> Result<()> {
    ensure!(
        got == expected,
        FormatError {
            reason: format!("column '{}' holds {} values, expected {}", name, got, expected),
        }
    );
    Ok(())
}

/// Extracts one auxiliary entry, maps it read-only, and chunk-copies it
/// into a fresh non-resident backing. The extracted file is deleted before
/// returning.
fn extract_aux<R: Read + std::io::Seek>(
    zip: &mut ZipArchive<R>,
    aux: &str,
    extract_dir: &Path,
    rows: usize,
    cell_len: usize,
    cfg: &crate::config::Config,
) -> Result<NdBuffer> {
    let mut entry = match zip.by_name(aux) {
        Ok(entry) => entry,
        Err(_) => bail!(FormatError {
            reason: format!("missing auxiliary entry '{}'", aux),
        }),
    };
    let extracted = extract_dir.join(aux);
    debug!(entry = %aux, "extracting auxiliary column");
    {
        let mut out = BufWriter::new(
            File::create(&extracted)
                .wrap_err_with(|| format!("failed to create '{}'", extracted.display()))?,
        );
        std::io::copy(&mut entry, &mut out)?;
        out.flush()?;
    }

    let expected = rows * cell_len * 8;
    let file = File::open(&extracted)?;
    let actual = file.metadata()?.len();
    if actual != expected as u64 {
        let _ = std::fs::remove_file(&extracted);
        bail!(FormatError {
            reason: format!(
                "auxiliary entry '{}' holds {} bytes, expected {}",
                aux, actual, expected
            ),
        });
    }

    let chunk_rows = cfg.chunk_rows((cell_len * 8).max(8) as u64);
    let mut buf = NdBuffer::new_mapped(rows, cell_len, 0.0, &cfg.tmp_dir, chunk_rows)?;
    if expected > 0 {
        // SAFETY: Mmap::map is unsafe because externally modified files lead
        // to undefined behavior. This is safe because:
        // 1. The file was just extracted by us into a process-scoped directory
        // 2. It is mapped read-only and deleted right after the copy
        let map = unsafe {
            memmap2::Mmap::map(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", extracted.display()))?
        };
        let dst = buf.as_mut_slice();
        let chunk = chunk_rows.max(1) * cell_len.max(1);
        for (i, part) in map.chunks(chunk * 8).enumerate() {
            for (j, raw) in part.chunks_exact(8).enumerate() {
                let mut le = [0u8; 8];
                le.copy_from_slice(raw);
                dst[i * chunk + j] = f64::from_le_bytes(le);
            }
        }
    }
    let _ = std::fs::remove_file(&extracted);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::column::{Assign, AxisKey, Key, NdAssign};

    fn sample_table(ctx: &Arc<Context>) -> Table {
        let mut t = Table::new(ctx, 3);
        t.insert("word", &ColumnVariant::Mixed).unwrap();
        t.col_mut("word")
            .unwrap()
            .set(
                &Key::All,
                &Assign::Seq(vec![Cell::from("a"), Cell::Missing, Cell::Int(3)]),
            )
            .unwrap();
        t.insert("rt", &ColumnVariant::Float).unwrap();
        t.col_mut("rt")
            .unwrap()
            .set(
                &Key::All,
                &Assign::Seq(vec![
                    Cell::Float(0.5),
                    Cell::Float(f64::NAN),
                    Cell::Float(1.5),
                ]),
            )
            .unwrap();
        t.insert("trace", &ColumnVariant::Series { depth: 2 }).unwrap();
        if let Column::MultiDim(c) = t.col_mut("trace").unwrap() {
            c.set_nd(
                &[AxisKey::All, AxisKey::All],
                NdAssign::Array {
                    values: &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
                    shape: &[3, 2],
                },
            )
            .unwrap();
        }
        t
    }

    #[test]
    fn round_trip_preserves_cells_and_nan() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new();
        let t = sample_table(&ctx);
        let path = dir.path().join("t.cdk");
        write_container(&t, &path).unwrap();

        let back = read_container(&ctx, &path).unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back.rowindex().ids(), t.rowindex().ids());
        assert_ne!(back.id(), t.id());
        match back.col("word").unwrap() {
            Column::Mixed(c) => {
                assert_eq!(*c.cell(0), Cell::from("a"));
                assert!(c.cell(1).is_missing());
            }
            other => panic!("expected mixed, got {:?}", other),
        }
        match back.col("rt").unwrap() {
            Column::Float(c) => {
                assert_eq!(c.get(0), 0.5);
                assert!(c.get(1).is_nan());
            }
            other => panic!("expected float, got {:?}", other),
        }
        match back.col("trace").unwrap() {
            Column::MultiDim(c) => {
                assert_eq!(c.cell(2).unwrap(), vec![5.0, 6.0]);
            }
            other => panic!("expected multidim, got {:?}", other),
        }
    }

    #[test]
    fn non_resident_column_streams_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = crate::config::Config::default();
        cfg.tmp_dir = dir.path().to_path_buf();
        let ctx = Context::with_config(cfg);
        let t = sample_table(&ctx);
        if let Column::MultiDim(c) = t.col("trace").unwrap() {
            c.set_loaded(false).unwrap();
            assert!(!c.loaded());
        }
        let path = dir.path().join("t.cdk");
        write_container(&t, &path).unwrap();
        // The write does not disturb the in-memory state.
        if let Column::MultiDim(c) = t.col("trace").unwrap() {
            assert!(!c.loaded());
        }

        let back = read_container(&ctx, &path).unwrap();
        match back.col("trace").unwrap() {
            Column::MultiDim(c) => {
                assert!(!c.loaded());
                assert_eq!(c.cell(0).unwrap(), vec![1.0, 2.0]);
                assert_eq!(c.cell(2).unwrap(), vec![5.0, 6.0]);
            }
            other => panic!("expected multidim, got {:?}", other),
        }
    }

    fn write_meta(path: &std::path::Path, meta: &TableMeta) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        zip.start_file("0.table", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(&bincode::serialize(meta).unwrap()).unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn scalar_column_count_mismatch_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new();

        // A structurally valid archive whose column is shorter than the
        // declared table length must be rejected, not trusted.
        let path = dir.path().join("short.cdk");
        write_meta(
            &path,
            &TableMeta {
                version: FORMAT_VERSION,
                length: 3,
                rowids: vec![0, 1, 2],
                columns: vec![ColumnMeta {
                    name: "n".to_string(),
                    kind: ColumnKindMeta::Int { values: vec![1] },
                }],
            },
        );
        let err = read_container(&ctx, &path).unwrap_err();
        assert!(err.downcast_ref::<FormatError>().is_some());

        // Same for a row identity list that disagrees with the length.
        let path = dir.path().join("ids.cdk");
        write_meta(
            &path,
            &TableMeta {
                version: FORMAT_VERSION,
                length: 2,
                rowids: vec![0],
                columns: Vec::new(),
            },
        );
        let err = read_container(&ctx, &path).unwrap_err();
        assert!(err.downcast_ref::<FormatError>().is_some());
    }

    #[test]
    fn metadata_without_labels_upgrades_to_label_less_columns() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new();
        let path = dir.path().join("old.cdk");
        write_meta(
            &path,
            &TableMeta {
                version: FORMAT_VERSION,
                length: 2,
                rowids: vec![0, 1],
                columns: vec![ColumnMeta {
                    name: "trace".to_string(),
                    kind: ColumnKindMeta::MultiDim {
                        shape: vec![2],
                        default_nan: true,
                        labels: None,
                        data: MdimData::Inline(vec![1.0, 2.0, 3.0, 4.0]),
                    },
                }],
            },
        );

        let back = read_container(&ctx, &path).unwrap();
        match back.col("trace").unwrap() {
            Column::MultiDim(c) => {
                assert!(c.labels(0).is_none());
                assert_eq!(c.cell(1).unwrap(), vec![3.0, 4.0]);
            }
            other => panic!("expected multidim, got {:?}", other),
        }
    }

    #[test]
    fn archive_without_metadata_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.cdk");
        {
            let file = File::create(&path).unwrap();
            let mut zip = ZipWriter::new(file);
            zip.start_file("stray.bin", SimpleFileOptions::default())
                .unwrap();
            zip.write_all(&[0u8; 8]).unwrap();
            zip.finish().unwrap();
        }
        let ctx = Context::new();
        let err = read_container(&ctx, &path).unwrap_err();
        assert!(err.downcast_ref::<FormatError>().is_some());
    }
}
