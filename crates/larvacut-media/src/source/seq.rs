//! Reader for compressed monochrome SEQ image sequences.
//!
//! A SEQ file is a fixed binary header followed by one record per frame:
//! a little-endian `u32` buffer size `s`, the JPEG payload, and an 8-byte
//! timestamp. Record `i` starts at `header_size + sum(s[0..i]) + 8 * i`, so
//! offsets are discovered by walking the records once and cached.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use image::ImageFormat;
use serde::Serialize;
use tracing::debug;

use super::{FrameSource, SourceInfo};
use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;

const IMAGE_INFO_OFFSET: u64 = 548;
const ALLOCATED_FRAMES_OFFSET: u64 = 572;
const FRAME_RATE_OFFSET: u64 = 584;
const COMPRESSION_OFFSET: u64 = 620;
const HEADER_SIZE_OFFSET: u64 = 32;
/// Bytes the header must span to hold every field we read.
const MIN_HEADER_LEN: usize = 624;

const FORMAT_MONOCHROME: u32 = 100;
const COMPRESSION_JPEG: u32 = 1;
const TIMESTAMP_LEN: u64 = 8;

/// Fields of the SEQ header the reader relies on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeqHeader {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u32,
    pub bit_depth_real: u32,
    pub image_size_bytes: u32,
    pub image_format: u32,
    pub allocated_frames: u32,
    pub compression: u32,
    pub header_size: i32,
    pub frame_rate: f64,
}

impl SeqHeader {
    /// Parse the header from the first bytes of a file.
    pub fn parse(bytes: &[u8]) -> MediaResult<Self> {
        if bytes.len() < MIN_HEADER_LEN {
            return Err(MediaError::invalid_video(format!(
                "SEQ header truncated: {} bytes",
                bytes.len()
            )));
        }
        let u32_at = |offset: u64| {
            let o = offset as usize;
            u32::from_le_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]])
        };
        let info = |field: u64| u32_at(IMAGE_INFO_OFFSET + 4 * field);

        let mut rate = [0u8; 8];
        let o = FRAME_RATE_OFFSET as usize;
        rate.copy_from_slice(&bytes[o..o + 8]);

        let header = Self {
            width: info(0),
            height: info(1),
            bit_depth: info(2),
            bit_depth_real: info(3),
            image_size_bytes: info(4),
            image_format: info(5),
            allocated_frames: u32_at(ALLOCATED_FRAMES_OFFSET),
            compression: u32_at(COMPRESSION_OFFSET),
            header_size: u32_at(HEADER_SIZE_OFFSET) as i32,
            frame_rate: f64::from_le_bytes(rate),
        };
        header.check()?;
        Ok(header)
    }

    fn check(&self) -> MediaResult<()> {
        if self.image_format != FORMAT_MONOCHROME {
            return Err(MediaError::UnsupportedFormat(format!(
                "SEQ image format {} is not monochrome",
                self.image_format
            )));
        }
        if self.compression != COMPRESSION_JPEG {
            return Err(MediaError::UnsupportedFormat(
                "only compressed SEQ files are supported".to_string(),
            ));
        }
        if self.header_size < 0 {
            return Err(MediaError::invalid_video(format!(
                "negative SEQ header size {}",
                self.header_size
            )));
        }
        Ok(())
    }
}

/// Sequential reader over a compressed monochrome SEQ file.
pub struct SeqReader {
    path: PathBuf,
    file: BufReader<File>,
    header: SeqHeader,
    file_len: u64,
    /// Start offsets of the records discovered so far.
    offsets: Vec<u64>,
    next_frame: u64,
}

impl SeqReader {
    pub fn open(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let file_len = file.metadata()?.len();
        let mut file = BufReader::new(file);

        let mut head = Vec::with_capacity(MIN_HEADER_LEN);
        (&mut file).take(MIN_HEADER_LEN as u64).read_to_end(&mut head)?;
        let header = SeqHeader::parse(&head)?;

        debug!(
            path = %path.display(),
            width = header.width,
            height = header.height,
            frames = header.allocated_frames,
            fps = header.frame_rate,
            "Opened SEQ file"
        );

        Ok(Self {
            path,
            file,
            header,
            file_len,
            offsets: vec![header.header_size as u64],
            next_frame: 0,
        })
    }

    pub fn header(&self) -> &SeqHeader {
        &self.header
    }

    pub fn len(&self) -> u64 {
        u64::from(self.header.allocated_frames)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode frame `index` as grayscale.
    pub fn frame(&mut self, index: u64) -> MediaResult<Frame> {
        if index >= self.len() {
            return Err(MediaError::invalid_video(format!(
                "frame {index} out of range for {} ({} frames)",
                self.path.display(),
                self.len()
            )));
        }
        let start = self.record_offset(index)?;
        let size = self.buffer_size_at(start)?;
        let payload_end = start + 4 + u64::from(size);
        if payload_end > self.file_len {
            return Err(MediaError::decode_failed(format!(
                "SEQ frame {index} claims {size} bytes, past the end of {} ({} bytes)",
                self.path.display(),
                self.file_len
            )));
        }

        let mut payload = vec![0u8; size as usize];
        self.file.read_exact(&mut payload).map_err(|e| {
            MediaError::decode_failed(format!("SEQ frame {index} truncated: {e}"))
        })?;

        let image = image::load_from_memory_with_format(&payload, ImageFormat::Jpeg)
            .map_err(|e| MediaError::decode_failed(format!("SEQ frame {index}: {e}")))?
            .to_luma8();
        let (width, height) = image.dimensions();
        Frame::from_gray(width, height, image.into_raw())
    }

    /// Offset of record `index`, walking and caching earlier records as needed.
    fn record_offset(&mut self, index: u64) -> MediaResult<u64> {
        while (self.offsets.len() as u64) <= index {
            let last = *self.offsets.last().unwrap_or(&(self.header.header_size as u64));
            let size = self.buffer_size_at(last)?;
            self.offsets.push(last + u64::from(size) + TIMESTAMP_LEN);
        }
        Ok(self.offsets[index as usize])
    }

    /// Read the buffer size field at `offset`, leaving the cursor on the payload.
    fn buffer_size_at(&mut self, offset: u64) -> MediaResult<u32> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut size = [0u8; 4];
        self.file.read_exact(&mut size).map_err(|e| {
            MediaError::decode_failed(format!("SEQ record at {offset} truncated: {e}"))
        })?;
        Ok(u32::from_le_bytes(size))
    }
}

impl FrameSource for SeqReader {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            width: self.header.width,
            height: self.header.height,
            total_frames: self.len(),
            fps: self.header.frame_rate,
        }
    }

    fn read(&mut self) -> MediaResult<Option<Frame>> {
        if self.next_frame >= self.len() {
            return Ok(None);
        }
        let frame = self.frame(self.next_frame)?;
        self.next_frame += 1;
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::ColorType;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER_SIZE: usize = 1024;

    fn jpeg(width: u32, height: u32, value: u8) -> Vec<u8> {
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 100)
            .encode(&vec![value; (width * height) as usize], width, height, ColorType::L8)
            .unwrap();
        out
    }

    fn header(width: u32, height: u32, frames: u32, format: u32, compression: u32) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_SIZE];
        let mut put = |offset: usize, value: &[u8]| {
            bytes[offset..offset + value.len()].copy_from_slice(value);
        };
        put(32, &(HEADER_SIZE as i32).to_le_bytes());
        put(548, &width.to_le_bytes());
        put(552, &height.to_le_bytes());
        put(556, &8u32.to_le_bytes());
        put(560, &8u32.to_le_bytes());
        put(564, &(width * height).to_le_bytes());
        put(568, &format.to_le_bytes());
        put(572, &frames.to_le_bytes());
        put(584, &25.0f64.to_le_bytes());
        put(620, &compression.to_le_bytes());
        bytes
    }

    fn write_seq(values: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&header(16, 8, values.len() as u32, 100, 1)).unwrap();
        for &value in values {
            let payload = jpeg(16, 8, value);
            file.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            file.write_all(&payload).unwrap();
            file.write_all(&[0u8; 8]).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_reads_header_fields() {
        let file = write_seq(&[10, 20]);
        let reader = SeqReader::open(file.path()).unwrap();
        let info = reader.info();
        assert_eq!((info.width, info.height), (16, 8));
        assert_eq!(info.total_frames, 2);
        assert_eq!(info.fps, 25.0);
        assert_eq!(reader.header().header_size, HEADER_SIZE as i32);
    }

    #[test]
    fn test_reads_frames_sequentially_until_exhausted() {
        let file = write_seq(&[40, 120, 200]);
        let mut reader = SeqReader::open(file.path()).unwrap();

        for expected in [40i16, 120, 200] {
            let frame = reader.read().unwrap().expect("frame");
            assert_eq!((frame.width(), frame.height()), (16, 8));
            let value = i16::from(frame.gray_at(5, 5));
            assert!((value - expected).abs() <= 2, "got {value}, want {expected}");
        }
        assert!(reader.read().unwrap().is_none());
        assert!(reader.read().unwrap().is_none());
    }

    #[test]
    fn test_random_access_after_sequential_walk() {
        let file = write_seq(&[30, 90, 150, 210]);
        let mut reader = SeqReader::open(file.path()).unwrap();
        let last = reader.frame(3).unwrap();
        assert!((i16::from(last.gray_at(0, 0)) - 210).abs() <= 2);
        let first = reader.frame(0).unwrap();
        assert!((i16::from(first.gray_at(0, 0)) - 30).abs() <= 2);
        assert!(reader.frame(4).is_err());
    }

    #[test]
    fn test_rejects_colour_and_uncompressed_files() {
        let colour = header(4, 4, 1, 200, 1);
        assert!(matches!(
            SeqHeader::parse(&colour),
            Err(MediaError::UnsupportedFormat(_))
        ));
        let raw = header(4, 4, 1, 100, 0);
        assert!(matches!(
            SeqHeader::parse(&raw),
            Err(MediaError::UnsupportedFormat(_))
        ));
        assert!(SeqHeader::parse(&[0u8; 100]).is_err());
    }

    #[test]
    fn test_corrupt_record_size_is_rejected_before_reading() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&header(16, 8, 1, 100, 1)).unwrap();
        file.write_all(&u32::MAX.to_le_bytes()).unwrap();
        file.write_all(&[0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
        file.flush().unwrap();

        let mut reader = SeqReader::open(file.path()).unwrap();
        assert!(matches!(reader.read(), Err(MediaError::DecodeFailed(_))));
    }

    #[test]
    fn test_truncated_last_frame_is_a_decode_error() {
        let file = write_seq(&[50, 60]);
        let full = std::fs::metadata(file.path()).unwrap().len();
        std::fs::OpenOptions::new()
            .write(true)
            .open(file.path())
            .unwrap()
            .set_len(full - 20)
            .unwrap();

        let mut reader = SeqReader::open(file.path()).unwrap();
        assert!(reader.read().unwrap().is_some());
        assert!(matches!(reader.read(), Err(MediaError::DecodeFailed(_))));
    }
}
