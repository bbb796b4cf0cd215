//! Dual-level (connection + per-stream) flow control (spec §4.5).

pub const DEFAULT_INITIAL_WINDOW_SIZE: i32 = 65_535;
pub const MAX_WINDOW_SIZE: i32 = (1 << 31) - 1;
const MIN_WINDOW_SIZE: i32 = -((1 << 31) - 1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControlError {
    /// Connection-level overflow/underflow (spec §4.5 "FLOW_CONTROL_ERROR at
    /// connection level").
    ConnectionOverflow,
    /// Stream-level overflow (PROTOCOL_ERROR) or underflow past the
    /// RFC 7540 §6.9.2 floor.
    StreamOverflow,
}

impl std::fmt::Display for FlowControlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowControlError::ConnectionOverflow => write!(f, "connection flow-control overflow"),
            FlowControlError::StreamOverflow => write!(f, "stream flow-control overflow"),
        }
    }
}

impl std::error::Error for FlowControlError {}

/// One side (send or recv) of one window, connection- or stream-scoped.
#[derive(Debug, Clone, Copy)]
pub struct Window {
    size: i32,
}

impl Window {
    pub fn new(initial: i32) -> Self {
        Window { size: initial }
    }

    pub fn current(&self) -> i32 {
        self.size
    }

    /// Applies a (possibly negative) SETTINGS_INITIAL_WINDOW_SIZE delta.
    /// Per RFC 7540 §6.9.2 the result may go negative; it's clamped at the
    /// documented floor rather than allowed to wrap.
    pub fn apply_settings_delta(&mut self, delta: i64) -> Result<(), FlowControlError> {
        let next = self.size as i64 + delta;
        if next < MIN_WINDOW_SIZE as i64 {
            return Err(FlowControlError::StreamOverflow);
        }
        self.size = next.min(MAX_WINDOW_SIZE as i64) as i32;
        Ok(())
    }

    /// Deducts `amount` (always non-negative). Fails if it would drive the
    /// window below the negative floor -- callers check available space via
    /// [`Window::current`] beforehand, so in practice this only fails on a
    /// caller bug.
    fn deduct(&mut self, amount: u32) -> Result<(), FlowControlError> {
        let next = self.size as i64 - amount as i64;
        if next < MIN_WINDOW_SIZE as i64 {
            return Err(FlowControlError::StreamOverflow);
        }
        self.size = next as i32;
        Ok(())
    }

    fn restore(&mut self, amount: u32) {
        self.size = (self.size as i64 + amount as i64).min(MAX_WINDOW_SIZE as i64) as i32;
    }

    /// Increments on receipt of WINDOW_UPDATE; rejects overflow past the
    /// 2^31-1 ceiling (spec §4.5 "increments must be positive... overflow is
    /// ... error").
    pub fn increment(&mut self, amount: u32) -> Result<(), FlowControlError> {
        let next = self.size as i64 + amount as i64;
        if next > MAX_WINDOW_SIZE as i64 {
            return Err(FlowControlError::ConnectionOverflow);
        }
        self.size = next as i32;
        Ok(())
    }
}

/// The four windows (connection send/recv, stream send/recv) needed to admit
/// or account for one stream's data transfer.
pub struct FlowController;

impl FlowController {
    /// `sendData`: amount actually transferable = min(len, conn window,
    /// stream window). Deducts both atomically; on stream-deduction failure
    /// after a successful connection deduction, the connection window is
    /// restored (spec §4.5).
    pub fn send_data(
        conn_window: &mut Window,
        stream_window: &mut Window,
        len: usize,
    ) -> Result<usize, FlowControlError> {
        let available = conn_window
            .current()
            .max(0)
            .min(stream_window.current().max(0)) as usize;
        let amount = available.min(len);
        if amount == 0 {
            return Ok(0);
        }
        conn_window.deduct(amount as u32)?;
        if let Err(e) = stream_window.deduct(amount as u32) {
            conn_window.restore(amount as u32);
            return Err(e);
        }
        Ok(amount)
    }

    /// `receiveData`: deduct connection-recv then stream-recv; restore
    /// connection on stream failure.
    pub fn receive_data(
        conn_window: &mut Window,
        stream_window: &mut Window,
        len: usize,
    ) -> Result<(), FlowControlError> {
        conn_window.deduct(len as u32)?;
        if let Err(e) = stream_window.deduct(len as u32) {
            conn_window.restore(len as u32);
            return Err(e);
        }
        Ok(())
    }

    pub fn should_send_window_update(current: i32, initial: i32) -> bool {
        current < initial / 2
    }

    pub fn calculate_window_update(current: i32, initial: i32) -> u32 {
        let target = initial.min(MAX_WINDOW_SIZE);
        (target - current).max(0) as u32
    }

    /// `chunkData`: yields a sequence of slices each bounded by the frame
    /// size cap and both windows, stopping when either window is exhausted.
    pub fn chunk_data<'a>(
        data: &'a [u8],
        conn_window: i32,
        stream_window: i32,
        max_frame_size: u32,
    ) -> Vec<&'a [u8]> {
        let mut chunks = Vec::new();
        let mut rest = data;
        let mut conn_remaining = conn_window.max(0) as usize;
        let mut stream_remaining = stream_window.max(0) as usize;

        while !rest.is_empty() {
            let cap = (max_frame_size as usize)
                .min(conn_remaining)
                .min(stream_remaining);
            if cap == 0 {
                break;
            }
            let take = cap.min(rest.len());
            let (chunk, remainder) = rest.split_at(take);
            chunks.push(chunk);
            rest = remainder;
            conn_remaining -= take;
            stream_remaining -= take;
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_data_caps_to_smaller_window() {
        let mut conn = Window::new(100);
        let mut stream = Window::new(30);
        let sent = FlowController::send_data(&mut conn, &mut stream, 50).unwrap();
        assert_eq!(sent, 30);
        assert_eq!(conn.current(), 70);
        assert_eq!(stream.current(), 0);
    }

    #[test]
    fn send_data_returns_zero_when_blocked() {
        let mut conn = Window::new(0);
        let mut stream = Window::new(10);
        let sent = FlowController::send_data(&mut conn, &mut stream, 5).unwrap();
        assert_eq!(sent, 0);
    }

    #[test]
    fn receive_data_restores_connection_on_stream_failure() {
        let mut conn = Window::new(100);
        let mut stream = Window::new(5);
        // Deducting 10 from a 5-sized window underflows below the floor only
        // if it goes past -(2^31-1); here it just goes negative which is
        // legal per RFC 7540 6.9.2, so exercise the restore path via a
        // window already near the floor instead.
        let mut tiny = Window::new(MIN_WINDOW_SIZE);
        let result = FlowController::receive_data(&mut conn, &mut tiny, 10);
        assert!(result.is_err());
        assert_eq!(conn.current(), 100);
        let _ = stream.current();
    }

    #[test]
    fn settings_delta_can_drive_window_negative() {
        let mut w = Window::new(100);
        w.apply_settings_delta(-150).unwrap();
        assert_eq!(w.current(), -50);
    }

    #[test]
    fn increment_rejects_overflow_past_ceiling() {
        let mut w = Window::new(MAX_WINDOW_SIZE - 1);
        assert!(w.increment(10).is_err());
    }

    #[test]
    fn should_send_window_update_below_half() {
        assert!(FlowController::should_send_window_update(
            30_000,
            DEFAULT_INITIAL_WINDOW_SIZE
        ));
        assert!(!FlowController::should_send_window_update(
            40_000,
            DEFAULT_INITIAL_WINDOW_SIZE
        ));
    }

    #[test]
    fn chunk_data_stops_when_window_exhausted() {
        let data = vec![0u8; 100];
        let chunks = FlowController::chunk_data(&data, 45, 1000, 20);
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        assert_eq!(total, 45);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 20);
        assert_eq!(chunks[2].len(), 5);
    }
}
