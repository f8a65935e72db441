use std::io::{self, Read};

/// Read until `buf` is full or the reader reports end of stream.
///
/// Returns the number of bytes placed in `buf`. Interrupted reads are retried. An error after
/// some bytes were read ends the fill early and returns the partial count; the error resurfaces
/// on the next call.
pub(crate) fn read_up_to<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if filled > 0 => {
                tracing::debug!("read error after {filled} bytes: {e}");
                break;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out at most `step` bytes per call and fails once after the first chunk.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
        interrupt_once: bool,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.pos > 0 && self.interrupt_once {
                self.interrupt_once = false;
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            let n = self.step.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn read_up_to_collects_short_reads() {
        let mut src = Trickle {
            data: (0u8..10).collect(),
            pos: 0,
            step: 3,
            interrupt_once: true,
        };
        let mut buf = [0u8; 8];
        assert_eq!(read_up_to(&mut src, &mut buf).unwrap(), 8);
        assert_eq!(buf, [0, 1, 2, 3, 4, 5, 6, 7]);

        let mut rest = [0u8; 8];
        assert_eq!(read_up_to(&mut src, &mut rest).unwrap(), 2);
        assert_eq!(&rest[..2], &[8, 9]);
        assert_eq!(read_up_to(&mut src, &mut rest).unwrap(), 0);
    }
}
