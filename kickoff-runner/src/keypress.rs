// Blocking "press any key" used before the launcher exits

use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use kickoff_core::Result;
use std::io::{self, IsTerminal, Read};

/// Restores cooked mode even if reading the event fails
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Block until a key is pressed. No timeout.
///
/// When stdin is not a terminal, one byte of input (or end of input) counts
/// as the key press.
pub fn wait_for_key() -> Result<()> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return wait_for_input(stdin.lock());
    }

    let _guard = RawModeGuard::enable()?;
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                return Ok(());
            }
        }
    }
}

/// Block until the reader yields a byte or reaches end of input
pub fn wait_for_input<R: Read>(mut reader: R) -> Result<()> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(_) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_returns_after_one_byte() {
        let mut input = Cursor::new(b"x\nrest".to_vec());
        wait_for_input(&mut input).unwrap();
        assert_eq!(input.position(), 1);
    }

    #[test]
    fn test_returns_on_end_of_input() {
        assert!(wait_for_input(Cursor::new(Vec::new())).is_ok());
    }

    struct ChannelReader(mpsc::Receiver<u8>);

    impl Read for ChannelReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.recv() {
                Ok(byte) => {
                    buf[0] = byte;
                    Ok(1)
                }
                Err(_) => Ok(0),
            }
        }
    }

    #[test]
    fn test_blocks_until_input_arrives() {
        let (key_tx, key_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        std::thread::spawn(move || {
            wait_for_input(ChannelReader(key_rx)).unwrap();
            done_tx.send(()).unwrap();
        });

        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());
        key_tx.send(b' ').unwrap();
        assert!(done_rx.recv_timeout(Duration::from_secs(1)).is_ok());
    }
}
