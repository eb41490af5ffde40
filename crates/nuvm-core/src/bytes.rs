//! Flux d'octets little-endian (lecture sur `BufRead`, écriture sur `Write`).

use std::io::{self, BufRead, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

/* ─────────────────────────── Byte Reader (LE) ─────────────────────────── */

/// Lecteur séquentiel avec contrôle explicite des bornes.
#[derive(Debug)]
pub struct ByteReader<R> {
    inner: R,
    pos: u64,
}

impl<'a> ByteReader<&'a [u8]> {
    /// Lecteur sur un slice en mémoire.
    pub fn from_slice(data: &'a [u8]) -> Self { Self::new(data) }
}

impl<R: BufRead> ByteReader<R> {
    /// Construit un lecteur.
    pub fn new(inner: R) -> Self { Self { inner, pos: 0 } }

    /// Octets consommés depuis la création.
    pub fn position(&self) -> u64 { self.pos }

    /// Rend le flux sous-jacent.
    pub fn into_inner(self) -> R { self.inner }

    fn short(&self, needed: usize, e: io::Error) -> Error {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::unexpected_eof(format!("need {needed} bytes at offset {}", self.pos))
        } else {
            e.into()
        }
    }

    /// Lit un octet.
    pub fn read_byte(&mut self) -> Result<u8> {
        let v = self.inner.read_u8().map_err(|e| self.short(1, e))?;
        self.pos += 1;
        Ok(v)
    }

    /// Lit un u16 LE.
    pub fn read_u16(&mut self) -> Result<u16> {
        let v = self.inner.read_u16::<LittleEndian>().map_err(|e| self.short(2, e))?;
        self.pos += 2;
        Ok(v)
    }

    /// Lit un i16 LE.
    pub fn read_i16(&mut self) -> Result<i16> {
        let v = self.inner.read_i16::<LittleEndian>().map_err(|e| self.short(2, e))?;
        self.pos += 2;
        Ok(v)
    }

    /// Lit un u32 LE.
    pub fn read_u32(&mut self) -> Result<u32> {
        let v = self.inner.read_u32::<LittleEndian>().map_err(|e| self.short(4, e))?;
        self.pos += 4;
        Ok(v)
    }

    /// Lit un i32 LE.
    pub fn read_i32(&mut self) -> Result<i32> {
        let v = self.inner.read_i32::<LittleEndian>().map_err(|e| self.short(4, e))?;
        self.pos += 4;
        Ok(v)
    }

    /// Remplit `buf` autant que possible ; renvoie le nombre d'octets lus.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.pos += filled as u64;
        Ok(filled)
    }

    /// Saute jusqu'à `n` octets ; renvoie le nombre d'octets sautés.
    pub fn skip_bytes(&mut self, n: u64) -> Result<u64> {
        let skipped = io::copy(&mut self.inner.by_ref().take(n), &mut io::sink())?;
        self.pos += skipped;
        Ok(skipped)
    }

    /// Vrai s'il reste au moins un octet.
    pub fn has_data(&mut self) -> Result<bool> { Ok(!self.inner.fill_buf()?.is_empty()) }
}

/* ─────────────────────────── Byte Writer (LE) ─────────────────────────── */

/// Écrivain séquentiel little-endian.
#[derive(Debug, Default)]
pub struct ByteWriter<W> {
    inner: W,
    written: u64,
}

impl ByteWriter<Vec<u8>> {
    /// Écrivain vers un buffer en mémoire.
    pub fn in_memory() -> Self { Self::new(Vec::new()) }

    /// Contenu écrit jusqu'ici.
    pub fn as_slice(&self) -> &[u8] { &self.inner }
}

impl<W: Write> ByteWriter<W> {
    /// Construit un écrivain.
    pub fn new(inner: W) -> Self { Self { inner, written: 0 } }

    /// Octets écrits depuis la création.
    pub fn written(&self) -> u64 { self.written }

    /// Rend le flux sous-jacent.
    pub fn into_inner(self) -> W { self.inner }

    /// Écrit un octet.
    pub fn write_byte(&mut self, v: u8) -> Result<()> {
        self.inner.write_u8(v)?;
        self.written += 1;
        Ok(())
    }

    /// Écrit un u16 LE.
    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        self.inner.write_u16::<LittleEndian>(v)?;
        self.written += 2;
        Ok(())
    }

    /// Écrit un i16 LE.
    pub fn write_i16(&mut self, v: i16) -> Result<()> {
        self.inner.write_i16::<LittleEndian>(v)?;
        self.written += 2;
        Ok(())
    }

    /// Écrit un u32 LE.
    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        self.inner.write_u32::<LittleEndian>(v)?;
        self.written += 4;
        Ok(())
    }

    /// Écrit un i32 LE.
    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        self.inner.write_i32::<LittleEndian>(v)?;
        self.written += 4;
        Ok(())
    }

    /// Écrit des octets bruts.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Vide le flux sous-jacent.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn writer_reader_le() -> Result<()> {
        let mut w = ByteWriter::in_memory();
        w.write_byte(0xAB)?;
        w.write_u16(0xBEEF)?;
        w.write_i16(-2)?;
        w.write_u32(0xDEAD_BEEF)?;
        w.write_i32(i32::MIN)?;
        w.flush()?;
        assert_eq!(w.written(), 13);
        assert_eq!(&w.as_slice()[..3], &[0xAB, 0xEF, 0xBE]);

        let bytes = w.into_inner();
        let mut r = ByteReader::from_slice(&bytes);
        assert_eq!(r.read_byte()?, 0xAB);
        assert_eq!(r.read_u16()?, 0xBEEF);
        assert_eq!(r.read_i16()?, -2);
        assert_eq!(r.read_u32()?, 0xDEAD_BEEF);
        assert_eq!(r.read_i32()?, i32::MIN);
        assert!(!r.has_data()?);
        assert_eq!(r.position(), 13);
        Ok(())
    }

    #[test]
    fn short_reads_are_unexpected_eof() {
        let mut r = ByteReader::from_slice(&[1, 2, 3]);
        let err = r.read_u32().unwrap_err();
        assert!(err.is(&ErrorKind::UnexpectedEof));

        let mut r = ByteReader::from_slice(&[]);
        assert!(r.read_byte().unwrap_err().is(&ErrorKind::UnexpectedEof));
    }

    #[test]
    fn read_bytes_reports_count() -> Result<()> {
        let mut r = ByteReader::from_slice(&[9, 8, 7]);
        let mut buf = [0u8; 5];
        assert_eq!(r.read_bytes(&mut buf)?, 3);
        assert_eq!(&buf[..3], &[9, 8, 7]);
        assert_eq!(r.read_bytes(&mut buf)?, 0);
        Ok(())
    }

    #[test]
    fn skip_and_has_data() -> Result<()> {
        let mut r = ByteReader::from_slice(&[0, 1, 2, 3]);
        assert!(r.has_data()?);
        assert_eq!(r.skip_bytes(3)?, 3);
        assert_eq!(r.read_byte()?, 3);
        assert_eq!(r.skip_bytes(10)?, 0);
        assert!(!r.has_data()?);
        Ok(())
    }
}
