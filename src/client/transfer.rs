use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::{debug, info};
use crate::error::Result;
use crate::path::{self, PathResolver};
use crate::retry::RetryExecutor;

fn read_chunk<R: Read + ?Sized>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

pub(crate) fn copy_chunked<R, W>(input: &mut R, output: &mut W, buffer_size: usize) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = read_chunk(input, &mut buf)?;
        if n == 0 {
            break;
        }
        output.write_all(&buf[..n])?;
        total += n as u64;
    }
    Ok(total)
}

/// 按块把输入流写入 `sink`，每写完一块都把输入流定位到已读位置之后
pub(crate) fn stream_chunks<R, W>(input: &mut R, sink: &mut W, chunk_size: usize) -> io::Result<u64>
where
    R: Read + Seek + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = read_chunk(input, &mut buf)?;
        if n == 0 {
            break;
        }
        sink.write_all(&buf[..n])?;
        total += n as u64;
        let position = input.stream_position()?;
        input.seek(SeekFrom::Start(position))?;
    }
    Ok(total)
}

/// 移动 `src` 到 `dest`（复制后删除源）
///
/// 源不存在时返回 false；`dest` 恰好是源的父目录时不删除源，结果为原地不动。
pub(crate) fn move_path(
    executor: &RetryExecutor,
    resolver: &PathResolver,
    src: &str,
    dest: &str,
) -> Result<bool> {
    if path::is_blank(src) || path::is_blank(dest) {
        return Ok(false);
    }
    let source = resolver.resolve(src)?;
    let target = resolver.resolve(dest)?;

    if !executor.execute(|s| s.exists(&source))? {
        info!("{} 不存在，本次移动操作终止", source);
        return Ok(false);
    }

    let same_dir = path::parent(&source) == path::normalize(&target).ok();
    if same_dir {
        debug!("move: {} already lives in {}", source, target);
    }
    executor.execute(|s| s.copy(&source, &target, !same_dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct Trickle(Cursor<Vec<u8>>);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let len = buf.len().min(3);
            self.0.read(&mut buf[..len])
        }
    }

    impl Seek for Trickle {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.0.seek(pos)
        }
    }

    #[derive(Default)]
    struct Recorder {
        data: Vec<u8>,
        writes: Vec<usize>,
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes.push(buf.len());
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_stream_chunks_fills_each_chunk() {
        let payload: Vec<u8> = (0..2500u32).map(|i| (i % 251) as u8).collect();
        let mut input = Trickle(Cursor::new(payload.clone()));
        let mut sink = Recorder::default();

        let copied = stream_chunks(&mut input, &mut sink, 1024).unwrap();
        assert_eq!(copied, 2500);
        assert_eq!(sink.data, payload);
        assert_eq!(sink.writes, vec![1024, 1024, 452]);
    }

    #[test]
    fn test_copy_chunked_empty_input() {
        let mut input = Cursor::new(Vec::<u8>::new());
        let mut sink = Recorder::default();
        assert_eq!(copy_chunked(&mut input, &mut sink, 2048).unwrap(), 0);
        assert!(sink.writes.is_empty());
    }
}
