//! LED line protocol framing
//!
//! Every message is a short ASCII line terminated by `\n`:
//!
//! ```text
//! LSS<ch>S<0|1>   set channel output            (host -> device)
//! LQS<ch>         query channel state           (host -> device)
//! LSC<ch>S<0|1>   channel changed, unsolicited  (device -> host)
//! LSR<ch>S<0|1>   channel state, query response (device -> host)
//! ```
//!
//! Encoding is pure. Decoding is split in two: [`LineDecoder`] only frames
//! bytes into lines, and [`Command::parse`] gives those lines meaning. The
//! dispatcher decides what to do with lines that fail to parse.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const LINE_TERMINATOR: u8 = b'\n';

/// Shortest line that can carry a channel and a value (`LSC0S1`)
pub const MIN_STATE_LINE_LEN: usize = 6;

/// Shortest query line (`LQS0`)
pub const MIN_QUERY_LINE_LEN: usize = 4;

const TAG_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// `LSS`
    SetState,
    /// `LQS`
    QueryState,
    /// `LSC`
    StateChanged,
    /// `LSR`
    StateReport,
}

impl CommandKind {
    pub const ALL: [CommandKind; 4] = [
        CommandKind::SetState,
        CommandKind::QueryState,
        CommandKind::StateChanged,
        CommandKind::StateReport,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            CommandKind::SetState => "LSS",
            CommandKind::QueryState => "LQS",
            CommandKind::StateChanged => "LSC",
            CommandKind::StateReport => "LSR",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "LSS" => Some(CommandKind::SetState),
            "LQS" => Some(CommandKind::QueryState),
            "LSC" => Some(CommandKind::StateChanged),
            "LSR" => Some(CommandKind::StateReport),
            _ => None,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            CommandKind::SetState | CommandKind::QueryState => Direction::Outgoing,
            CommandKind::StateChanged | CommandKind::StateReport => Direction::Incoming,
        }
    }

    /// Whether lines of this kind carry a `S<0|1>` value
    pub fn has_value(&self) -> bool {
        !matches!(self, CommandKind::QueryState)
    }
}

/// Single printable ASCII token naming a channel on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId(char);

impl ChannelId {
    pub fn new(c: char) -> Option<Self> {
        if c.is_ascii_graphic() {
            Some(Self(c))
        } else {
            None
        }
    }

    pub fn as_char(&self) -> char {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for ChannelId {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => ChannelId::new(c).ok_or_else(|| format!("Invalid channel id: {:?}", s)),
            _ => Err(format!("Channel id must be a single character: {:?}", s)),
        }
    }
}

impl TryFrom<String> for ChannelId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ChannelId::try_from(s.as_str())
    }
}

impl From<ChannelId> for String {
    fn from(id: ChannelId) -> Self {
        id.0.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub channel: ChannelId,
    /// Present for every kind except `QueryState`
    pub value: Option<bool>,
}

impl Command {
    pub fn set_state(channel: ChannelId, on: bool) -> Self {
        Self { kind: CommandKind::SetState, channel, value: Some(on) }
    }

    pub fn query_state(channel: ChannelId) -> Self {
        Self { kind: CommandKind::QueryState, channel, value: None }
    }

    pub fn state_changed(channel: ChannelId, on: bool) -> Self {
        Self { kind: CommandKind::StateChanged, channel, value: Some(on) }
    }

    pub fn state_report(channel: ChannelId, on: bool) -> Self {
        Self { kind: CommandKind::StateReport, channel, value: Some(on) }
    }

    pub fn direction(&self) -> Direction {
        self.kind.direction()
    }

    /// Encode as a terminated protocol line
    pub fn encode(&self) -> Vec<u8> {
        encode(self.kind, self.channel, self.value)
    }

    /// Parse one line (without its terminator). Returns `None` for anything
    /// that is too short, carries an unknown tag, or has a value other than
    /// `0`/`1`. The separator at index 4 is not checked.
    pub fn parse(line: &str) -> Option<Self> {
        let chars: Vec<char> = line.chars().collect();
        if chars.len() < TAG_LEN {
            return None;
        }

        let tag: String = chars[..TAG_LEN].iter().collect();
        let kind = CommandKind::from_tag(&tag)?;

        if kind.has_value() {
            if chars.len() < MIN_STATE_LINE_LEN {
                return None;
            }
            let channel = ChannelId::new(chars[3])?;
            let value = match chars[5] {
                '0' => false,
                '1' => true,
                _ => return None,
            };
            Some(Self { kind, channel, value: Some(value) })
        } else {
            if chars.len() < MIN_QUERY_LINE_LEN {
                return None;
            }
            let channel = ChannelId::new(chars[3])?;
            Some(Self { kind, channel, value: None })
        }
    }
}

/// Encode a command line, e.g. `LSS1S1\n` or `LQS2\n`.
///
/// A value passed for `QueryState` is ignored; a missing value for the other
/// kinds is written as `0`.
pub fn encode(kind: CommandKind, channel: ChannelId, value: Option<bool>) -> Vec<u8> {
    let line = if kind.has_value() {
        let v = if value.unwrap_or(false) { '1' } else { '0' };
        format!("{}{}S{}\n", kind.tag(), channel, v)
    } else {
        format!("{}{}\n", kind.tag(), channel)
    };
    line.into_bytes()
}

/// Split every complete line out of `buffer`.
///
/// Returns the decoded lines and the unterminated remainder, which the caller
/// must prepend to the next read.
pub fn decode(buffer: &[u8]) -> (Vec<String>, Vec<u8>) {
    let mut lines = Vec::new();
    let mut start = 0;
    while let Some(pos) = buffer[start..].iter().position(|&b| b == LINE_TERMINATOR) {
        let end = start + pos;
        lines.push(String::from_utf8_lossy(&buffer[start..end]).into_owned());
        start = end + 1;
    }
    (lines, buffer[start..].to_vec())
}

/// Decode Buffer that survives across reads.
///
/// There is no cap on the pending partial line: a peer that never sends a
/// terminator makes it grow without bound.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes and drain every complete line
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut consumed = 0;
        while let Some(pos) = self.buffer[consumed..].iter().position(|&b| b == LINE_TERMINATOR) {
            let end = consumed + pos;
            lines.push(String::from_utf8_lossy(&self.buffer[consumed..end]).into_owned());
            consumed = end + 1;
        }
        self.buffer.drain(..consumed);
        lines
    }

    /// Bytes of the current unterminated line
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
