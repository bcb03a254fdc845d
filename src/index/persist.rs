// dixsearch: Double-indexed local alignment search
//
// Copyright 2024 Tommi Mäklin [tommi@maklin.fi].

// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.

// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//
//! Reading and writing index directories.
//!
//! Binary files are sequences of little-endian `u64` values; arrays are
//! prefixed with their length. Every index file starts with the
//! length-prefixed name of the structure it holds. Scalar settings are
//! stored as plain text in `option:<name>` files.
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::path::Path;

use crate::alphabet::Alphabet;
use crate::error::Error;
use crate::index::fm::BiFmIndex;
use crate::index::fm::FmCore;
use crate::index::fm::FmIndex;
use crate::index::sa::SuffixArray;
use crate::index::Backend;
use crate::index::IndexVariant;
use crate::index::SubjectIndex;
use crate::index::TextLayout;
use crate::seqset::SeqOrigin;
use crate::seqset::SequenceSet;
use crate::seqset::TranslatedSet;

/// Version of the on-disk format, stored in `option:generation`.
pub const INDEX_GENERATION: u64 = 1;

/// Subject names, one per line.
pub const SUBJECT_NAMES_FILE: &str = "subj_names";
/// Translated subject sequences.
pub const SUBJECT_SEQS_FILE: &str = "subj_seqs";

fn eof_to_corrupt(err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::CorruptIndex("file ends unexpectedly".to_string())
    } else {
        Error::Io(err)
    }
}

pub(crate) fn write_u64<W: Write>(out: &mut W, value: u64) -> Result<(), Error> {
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn read_u64<R: Read>(conn: &mut R) -> Result<u64, Error> {
    let mut buf = [0_u8; 8];
    conn.read_exact(&mut buf).map_err(eof_to_corrupt)?;
    Ok(u64::from_le_bytes(buf))
}

// Reads exactly `len` bytes without trusting `len` for the allocation
fn read_exact_len<R: Read>(conn: &mut R, len: u64) -> Result<Vec<u8>, Error> {
    let mut buf: Vec<u8> = Vec::new();
    conn.take(len).read_to_end(&mut buf)?;
    if (buf.len() as u64) != len {
        return Err(Error::CorruptIndex(format!("expected {} bytes, found {}", len, buf.len())));
    }
    Ok(buf)
}

pub(crate) fn write_bytes<W: Write>(out: &mut W, values: &[u8]) -> Result<(), Error> {
    write_u64(out, values.len() as u64)?;
    out.write_all(values)?;
    Ok(())
}

pub(crate) fn read_bytes<R: Read>(conn: &mut R) -> Result<Vec<u8>, Error> {
    let len = read_u64(conn)?;
    read_exact_len(conn, len)
}

pub(crate) fn write_u64s<W: Write>(out: &mut W, values: &[u64]) -> Result<(), Error> {
    write_u64(out, values.len() as u64)?;
    for value in values {
        out.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

pub(crate) fn read_u64s<R: Read>(conn: &mut R) -> Result<Vec<u64>, Error> {
    let len = read_u64(conn)?;
    let bytes = read_exact_len(conn, len.saturating_mul(8))?;
    Ok(bytes.chunks_exact(8).map(|x| {
        let mut buf = [0_u8; 8];
        buf.copy_from_slice(x);
        u64::from_le_bytes(buf)
    }).collect())
}

pub(crate) fn write_usizes<W: Write>(out: &mut W, values: &[usize]) -> Result<(), Error> {
    write_u64(out, values.len() as u64)?;
    for value in values {
        out.write_all(&(*value as u64).to_le_bytes())?;
    }
    Ok(())
}

pub(crate) fn read_usizes<R: Read>(conn: &mut R) -> Result<Vec<usize>, Error> {
    Ok(read_u64s(conn)?.into_iter().map(|x| x as usize).collect())
}

fn write_header<W: Write>(out: &mut W, name: &str) -> Result<(), Error> {
    write_bytes(out, name.as_bytes())
}

fn check_header<R: Read>(conn: &mut R, name: &str) -> Result<(), Error> {
    let got = read_bytes(conn)?;
    if got != name.as_bytes() {
        return Err(Error::CorruptIndex(format!("expected a {} file, found `{}`", name, String::from_utf8_lossy(&got))));
    }
    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<std::fs::File>, Error> {
    Ok(BufWriter::new(std::fs::File::create(path)?))
}

fn open(path: &Path) -> Result<BufReader<std::fs::File>, Error> {
    match std::fs::File::open(path) {
        Ok(conn) => Ok(BufReader::new(conn)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::CorruptIndex(format!("missing index file {}", path.display()))),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Names of the files holding a `variant` index.
pub fn index_files(variant: IndexVariant) -> &'static [&'static str] {
    match variant {
        IndexVariant::SuffixArray => &["index.sa"],
        IndexVariant::FmIndex => &["index.fm"],
        IndexVariant::BiFmIndex => &["index.bifm.fwd", "index.bifm.rev"],
    }
}

fn write_layout<W: Write>(out: &mut W, index: &SubjectIndex) -> Result<(), Error> {
    write_bytes(out, index.alphabet.name().as_bytes())?;
    write_u64(out, index.layout.len() as u64)?;
    write_usizes(out, index.layout.starts())?;
    Ok(())
}

fn read_layout<R: Read>(conn: &mut R) -> Result<(Alphabet, TextLayout), Error> {
    let name = read_bytes(conn)?;
    let alphabet = Alphabet::from_name(&String::from_utf8_lossy(&name))
        .ok_or_else(|| Error::CorruptIndex("unknown index alphabet".to_string()))?;
    let len = read_u64(conn)? as usize;
    let starts = read_usizes(conn)?;
    Ok((alphabet, TextLayout::from_parts(starts, len)?))
}

/// Writes `index` into the directory `dir`.
pub fn save_index(index: &SubjectIndex, dir: &Path) -> Result<(), Error> {
    let files = index_files(index.variant());
    let mut out = create(&dir.join(files[0]))?;
    write_header(&mut out, index.variant().name())?;
    write_layout(&mut out, index)?;
    match &index.backend {
        Backend::Sa(sa) => sa.write_to(&mut out)?,
        Backend::Fm(fm) => fm.write_to(&mut out)?,
        Backend::BiFm(bifm) => {
            bifm.write_right(&mut out)?;
            let mut left = create(&dir.join(files[1]))?;
            write_header(&mut left, index.variant().name())?;
            bifm.write_left(&mut left)?;
            left.flush()?;
        },
    }
    out.flush()?;
    Ok(())
}

/// Reads a `variant` index from the directory `dir`.
pub fn load_index(variant: IndexVariant, dir: &Path) -> Result<SubjectIndex, Error> {
    let files = index_files(variant);
    let mut conn = open(&dir.join(files[0]))?;
    check_header(&mut conn, variant.name())?;
    let (alphabet, layout) = read_layout(&mut conn)?;

    let backend = match variant {
        IndexVariant::SuffixArray => {
            let sa = SuffixArray::read_from(&mut conn)?;
            if sa.len() != layout.len() {
                return Err(Error::CorruptIndex("suffix array length does not match the subjects".to_string()));
            }
            Backend::Sa(sa)
        },
        IndexVariant::FmIndex => Backend::Fm(FmIndex::read_from(&mut conn)?),
        IndexVariant::BiFmIndex => {
            let right = FmCore::read_from(&mut conn)?;
            let mut left_conn = open(&dir.join(files[1]))?;
            check_header(&mut left_conn, variant.name())?;
            let left = FmCore::read_from(&mut left_conn)?;
            Backend::BiFm(BiFmIndex::from_parts(left, right)?)
        },
    };

    Ok(SubjectIndex { layout, alphabet, backend })
}

/// Writes the plain text option `name`.
pub fn write_option(dir: &Path, name: &str, value: &str) -> Result<(), Error> {
    std::fs::write(dir.join(format!("option:{}", name)), format!("{}\n", value))?;
    Ok(())
}

/// Reads the plain text option `name`, trimmed.
pub fn read_option(dir: &Path, name: &str) -> Result<String, Error> {
    let path = dir.join(format!("option:{}", name));
    match std::fs::read_to_string(&path) {
        Ok(value) => Ok(value.trim().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::CorruptIndex(format!("missing option file {}", path.display()))),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Writes the translated subjects.
pub fn save_subjects(subjects: &TranslatedSet, dir: &Path) -> Result<(), Error> {
    let mut out = create(&dir.join(SUBJECT_SEQS_FILE))?;
    write_header(&mut out, SUBJECT_SEQS_FILE)?;
    write_bytes(&mut out, subjects.alphabet.name().as_bytes())?;
    write_bytes(&mut out, subjects.seqs.data())?;
    write_usizes(&mut out, subjects.seqs.limits())?;
    write_usizes(&mut out, &subjects.origins.iter().map(|x| x.id).collect::<Vec<usize>>())?;
    write_u64s(&mut out, &subjects.origins.iter().map(|x| x.frame as i64 as u64).collect::<Vec<u64>>())?;
    write_usizes(&mut out, &subjects.orig_lens)?;
    out.flush()?;
    Ok(())
}

/// Reads the translated subjects.
pub fn load_subjects(dir: &Path) -> Result<TranslatedSet, Error> {
    let mut conn = open(&dir.join(SUBJECT_SEQS_FILE))?;
    check_header(&mut conn, SUBJECT_SEQS_FILE)?;
    let name = read_bytes(&mut conn)?;
    let alphabet = Alphabet::from_name(&String::from_utf8_lossy(&name))
        .ok_or_else(|| Error::CorruptIndex("unknown subject alphabet".to_string()))?;
    let data = read_bytes(&mut conn)?;
    let limits = read_usizes(&mut conn)?;
    let seqs = SequenceSet::from_parts(data, limits)?;
    let ids = read_usizes(&mut conn)?;
    let frames = read_u64s(&mut conn)?;
    let orig_lens = read_usizes(&mut conn)?;

    if ids.len() != seqs.len() || frames.len() != seqs.len() || ids.iter().any(|x| *x >= orig_lens.len()) {
        return Err(Error::CorruptIndex("subject origins do not match the sequences".to_string()));
    }
    let origins = ids.into_iter().zip(frames).map(|(id, frame)| SeqOrigin { id, frame: frame as i64 as i8 }).collect();

    Ok(TranslatedSet { seqs, origins, orig_lens, alphabet })
}

/// Writes one subject name per line.
pub fn save_names(names: &[String], dir: &Path) -> Result<(), Error> {
    let mut out = create(&dir.join(SUBJECT_NAMES_FILE))?;
    for name in names {
        writeln!(out, "{}", name)?;
    }
    out.flush()?;
    Ok(())
}

/// Reads the subject names.
pub fn load_names(dir: &Path) -> Result<Vec<String>, Error> {
    let path = dir.join(SUBJECT_NAMES_FILE);
    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(contents.lines().map(|x| x.to_string()).collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::CorruptIndex(format!("missing {}", path.display()))),
        Err(e) => Err(Error::Io(e)),
    }
}
