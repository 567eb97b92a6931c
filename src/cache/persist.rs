// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reading and writing kernel buffers to disk.
//!
//! Each cache cell is written to its own little-endian binary file named
//! `{qualifier}CFS_{pa_index}_{ant_index}`. The file starts with the bytes
//! "CFBUF" and a format version, then the cell's key, the buffer's axes and
//! polarisation maps, and finally every kernel of the buffer.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::prelude::*;

use super::{
    buffer::{CfBuffer, CfCell},
    CfCacheError,
};
use crate::{
    c32,
    constants::{CF_FILE_MAGIC, CF_FILE_VERSION},
    polarisation::{MuellerElement, PolIndexMat, PolMat},
};

/// The key of a persisted cache cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct CellKey {
    pub(crate) pa: f64,
    pub(crate) ant1: i32,
    pub(crate) ant2: i32,
}

pub(crate) fn cf_file_name(qualifier: &str, pa_index: usize, ant_index: usize) -> String {
    format!("{qualifier}CFS_{pa_index}_{ant_index}")
}

/// Get the cell indices out of a file name written by [`cf_file_name`].
pub(crate) fn parse_cf_file_name(name: &str, qualifier: &str) -> Option<(usize, usize)> {
    let rest = name.strip_prefix(qualifier)?.strip_prefix("CFS_")?;
    let (pa, ant) = rest.split_once('_')?;
    Some((pa.parse().ok()?, ant.parse().ok()?))
}

pub(crate) fn write(file: &Path, key: CellKey, buffer: &CfBuffer) -> Result<(), CfCacheError> {
    let mut bin_file = BufWriter::new(File::create(file)?);
    bin_file.write_all(CF_FILE_MAGIC)?;
    bin_file.write_u32::<LittleEndian>(CF_FILE_VERSION)?;

    bin_file.write_f64::<LittleEndian>(key.pa)?;
    bin_file.write_i32::<LittleEndian>(key.ant1)?;
    bin_file.write_i32::<LittleEndian>(key.ant2)?;

    bin_file.write_f64::<LittleEndian>(buffer.w_scale)?;
    bin_file.write_f64::<LittleEndian>(buffer.freq_incr)?;
    bin_file.write_f64::<LittleEndian>(buffer.pointing_offset[0])?;
    bin_file.write_f64::<LittleEndian>(buffer.pointing_offset[1])?;

    let (num_freqs, num_w, num_mueller) = buffer.cells.dim();
    bin_file.write_u32::<LittleEndian>(num_freqs as u32)?;
    bin_file.write_u32::<LittleEndian>(num_w as u32)?;
    bin_file.write_u32::<LittleEndian>(num_mueller as u32)?;
    for &f in &buffer.freq_values {
        bin_file.write_f64::<LittleEndian>(f)?;
    }
    for &w in &buffer.w_values {
        bin_file.write_f64::<LittleEndian>(w)?;
    }
    write_pol_mat(&mut bin_file, &buffer.pol_mat)?;
    write_pol_index_mat(&mut bin_file, &buffer.pol_index_mat)?;
    write_pol_mat(&mut bin_file, &buffer.conj_pol_mat)?;
    write_pol_index_mat(&mut bin_file, &buffer.conj_pol_index_mat)?;

    // Cells are in row-major [freq][w][mueller] order.
    for cell in buffer.cells.iter() {
        bin_file.write_u32::<LittleEndian>(cell.shape[0] as u32)?;
        bin_file.write_u32::<LittleEndian>(cell.shape[1] as u32)?;
        bin_file.write_f32::<LittleEndian>(cell.sampling)?;
        bin_file.write_i32::<LittleEndian>(cell.x_support)?;
        bin_file.write_i32::<LittleEndian>(cell.y_support)?;
        bin_file.write_f64::<LittleEndian>(cell.freq_hz)?;
        bin_file.write_f64::<LittleEndian>(cell.w_value)?;
        bin_file.write_i32::<LittleEndian>(cell.mueller_element.row)?;
        bin_file.write_i32::<LittleEndian>(cell.mueller_element.col)?;
        bin_file.write_f64::<LittleEndian>(cell.pa_rad)?;
        match &cell.kernel {
            None => bin_file.write_u8(0)?,
            Some(kernel) => {
                bin_file.write_u8(1)?;
                let (kx, ky) = kernel.dim();
                bin_file.write_u32::<LittleEndian>(kx as u32)?;
                bin_file.write_u32::<LittleEndian>(ky as u32)?;
                for v in kernel.iter() {
                    bin_file.write_f32::<LittleEndian>(v.re)?;
                    bin_file.write_f32::<LittleEndian>(v.im)?;
                }
            }
        }
    }
    bin_file.flush()?;
    Ok(())
}

pub(crate) fn read(file: &Path) -> Result<(CellKey, CfBuffer), CfCacheError> {
    let bad = |reason: String| CfCacheError::BadPersistentFile {
        file: file.to_path_buf(),
        reason,
    };

    let mut bin_file = BufReader::new(File::open(file)?);
    let mut magic = [0; 5];
    bin_file.read_exact(&mut magic)?;
    if &magic != CF_FILE_MAGIC {
        return Err(bad(format!(
            "expected the file to start with {:?}, got {:?}",
            String::from_utf8_lossy(CF_FILE_MAGIC),
            String::from_utf8_lossy(&magic)
        )));
    }
    let version = bin_file.read_u32::<LittleEndian>()?;
    if version != CF_FILE_VERSION {
        return Err(bad(format!(
            "unsupported format version {version} (expected {CF_FILE_VERSION})"
        )));
    }

    let key = CellKey {
        pa: bin_file.read_f64::<LittleEndian>()?,
        ant1: bin_file.read_i32::<LittleEndian>()?,
        ant2: bin_file.read_i32::<LittleEndian>()?,
    };

    let mut buffer = CfBuffer {
        w_scale: bin_file.read_f64::<LittleEndian>()?,
        freq_incr: bin_file.read_f64::<LittleEndian>()?,
        ..Default::default()
    };
    buffer.pointing_offset = [
        bin_file.read_f64::<LittleEndian>()?,
        bin_file.read_f64::<LittleEndian>()?,
    ];

    let num_freqs = bin_file.read_u32::<LittleEndian>()? as usize;
    let num_w = bin_file.read_u32::<LittleEndian>()? as usize;
    let num_mueller = bin_file.read_u32::<LittleEndian>()? as usize;
    buffer.freq_values = vec![0.0; num_freqs];
    bin_file.read_f64_into::<LittleEndian>(&mut buffer.freq_values)?;
    buffer.w_values = vec![0.0; num_w];
    bin_file.read_f64_into::<LittleEndian>(&mut buffer.w_values)?;
    buffer.pol_mat = read_pol_mat(&mut bin_file)?;
    buffer.pol_index_mat = read_pol_index_mat(&mut bin_file)?;
    buffer.conj_pol_mat = read_pol_mat(&mut bin_file)?;
    buffer.conj_pol_index_mat = read_pol_index_mat(&mut bin_file)?;

    let flat_mueller: usize = buffer.pol_mat.iter().map(|row| row.len()).sum();
    if flat_mueller != num_mueller {
        return Err(bad(format!(
            "the polarisation map has {flat_mueller} elements, but the Mueller axis has {num_mueller}"
        )));
    }

    let mut cells = Vec::with_capacity(num_freqs * num_w * num_mueller);
    for _ in 0..num_freqs * num_w * num_mueller {
        let shape = [
            bin_file.read_u32::<LittleEndian>()? as usize,
            bin_file.read_u32::<LittleEndian>()? as usize,
        ];
        let mut cell = CfCell {
            kernel: None,
            shape,
            sampling: bin_file.read_f32::<LittleEndian>()?,
            x_support: bin_file.read_i32::<LittleEndian>()?,
            y_support: bin_file.read_i32::<LittleEndian>()?,
            freq_hz: bin_file.read_f64::<LittleEndian>()?,
            w_value: bin_file.read_f64::<LittleEndian>()?,
            mueller_element: MuellerElement::new(
                bin_file.read_i32::<LittleEndian>()?,
                bin_file.read_i32::<LittleEndian>()?,
            ),
            pa_rad: bin_file.read_f64::<LittleEndian>()?,
        };
        match bin_file.read_u8()? {
            0 => (),
            1 => {
                let kx = bin_file.read_u32::<LittleEndian>()? as usize;
                let ky = bin_file.read_u32::<LittleEndian>()? as usize;
                let mut values = vec![0.0; 2 * kx * ky];
                bin_file.read_f32_into::<LittleEndian>(&mut values)?;
                let values: Vec<c32> = values
                    .chunks_exact(2)
                    .map(|pair| c32::new(pair[0], pair[1]))
                    .collect();
                let kernel =
                    Array2::from_shape_vec((kx, ky), values).map_err(|e| bad(e.to_string()))?;
                cell.kernel = Some(kernel);
            }
            v => return Err(bad(format!("unexpected kernel flag {v}"))),
        }
        cells.push(cell);
    }
    buffer.cells = Array3::from_shape_vec((num_freqs, num_w, num_mueller), cells)
        .map_err(|e| bad(e.to_string()))?;

    Ok((key, buffer))
}

fn write_pol_mat<W: Write>(w: &mut W, pol_mat: &PolMat) -> std::io::Result<()> {
    w.write_u32::<LittleEndian>(pol_mat.len() as u32)?;
    for row in pol_mat {
        w.write_u32::<LittleEndian>(row.len() as u32)?;
        for e in row {
            w.write_i32::<LittleEndian>(e.row)?;
            w.write_i32::<LittleEndian>(e.col)?;
        }
    }
    Ok(())
}

fn write_pol_index_mat<W: Write>(w: &mut W, index_mat: &PolIndexMat) -> std::io::Result<()> {
    w.write_u32::<LittleEndian>(index_mat.len() as u32)?;
    for row in index_mat {
        w.write_u32::<LittleEndian>(row.len() as u32)?;
        for &i in row {
            w.write_u32::<LittleEndian>(i as u32)?;
        }
    }
    Ok(())
}

fn read_pol_mat<R: Read>(r: &mut R) -> std::io::Result<PolMat> {
    let num_rows = r.read_u32::<LittleEndian>()?;
    let mut pol_mat = Vec::with_capacity(num_rows as usize);
    for _ in 0..num_rows {
        let len = r.read_u32::<LittleEndian>()?;
        let mut row = Vec::with_capacity(len as usize);
        for _ in 0..len {
            let m_row = r.read_i32::<LittleEndian>()?;
            let m_col = r.read_i32::<LittleEndian>()?;
            row.push(MuellerElement::new(m_row, m_col));
        }
        pol_mat.push(row);
    }
    Ok(pol_mat)
}

fn read_pol_index_mat<R: Read>(r: &mut R) -> std::io::Result<PolIndexMat> {
    let num_rows = r.read_u32::<LittleEndian>()?;
    let mut index_mat = Vec::with_capacity(num_rows as usize);
    for _ in 0..num_rows {
        let len = r.read_u32::<LittleEndian>()?;
        let mut row = Vec::with_capacity(len as usize);
        for _ in 0..len {
            row.push(r.read_u32::<LittleEndian>()? as usize);
        }
        index_mat.push(row);
    }
    Ok(index_mat)
}
