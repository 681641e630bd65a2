//! Command definitions
//!
//! Turns a decoded argument vector into a typed command. Arity is checked
//! exactly; names match ASCII case-insensitively.

use super::response::ErrorCode;

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    Get,
    Set,
    Del,
    Keys,
    PExpire,
    PTtl,
    ZAdd,
    ZRem,
    ZScore,
    ZQuery,
    ZRank,
    ZCount,
}

impl CommandType {
    /// Lookup table: (name, argument count including the name)
    const TABLE: [(&'static str, usize, CommandType); 12] = [
        ("get", 2, CommandType::Get),
        ("set", 3, CommandType::Set),
        ("del", 2, CommandType::Del),
        ("keys", 1, CommandType::Keys),
        ("pexpire", 3, CommandType::PExpire),
        ("pttl", 2, CommandType::PTtl),
        ("zadd", 4, CommandType::ZAdd),
        ("zrem", 3, CommandType::ZRem),
        ("zscore", 3, CommandType::ZScore),
        ("zquery", 6, CommandType::ZQuery),
        ("zrank", 3, CommandType::ZRank),
        ("zcount", 6, CommandType::ZCount),
    ];

    /// Resolve a command name and check its arity
    fn resolve(name: &[u8], argc: usize) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(n, arity, _)| *arity == argc && name.eq_ignore_ascii_case(n.as_bytes()))
            .map(|&(_, _, ty)| ty)
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Get a string value
    Get { key: Vec<u8> },

    /// Set a string value
    Set { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Del { key: Vec<u8> },

    /// List all keys
    Keys,

    /// Set (or with a negative value, clear) a TTL in milliseconds
    PExpire { key: Vec<u8>, ttl_ms: i64 },

    /// Remaining TTL in milliseconds
    PTtl { key: Vec<u8> },

    /// Add or re-score a member
    ZAdd { key: Vec<u8>, score: f64, name: Vec<u8> },

    /// Remove a member
    ZRem { key: Vec<u8>, name: Vec<u8> },

    /// Score of a member
    ZScore { key: Vec<u8>, name: Vec<u8> },

    /// Range query: seek to (score, name), skip `offset`, return `limit` pairs
    ZQuery {
        key: Vec<u8>,
        score: f64,
        name: Vec<u8>,
        offset: i64,
        limit: i64,
    },

    /// Rank of a member
    ZRank { key: Vec<u8>, name: Vec<u8> },

    /// Members in `[(score1, name1), (score2, name2))`
    ZCount {
        key: Vec<u8>,
        from: (f64, Vec<u8>),
        to: (f64, Vec<u8>),
    },
}

/// A command that cannot run, reported to the client as an `ERR` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandError {
    pub code: ErrorCode,
    pub message: String,
}

impl CommandError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

fn parse_f64(arg: &[u8]) -> Result<f64, CommandError> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| !v.is_nan())
        .ok_or_else(|| CommandError::new(ErrorCode::Arg, "expect float"))
}

fn parse_i64(arg: &[u8]) -> Result<i64, CommandError> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| CommandError::new(ErrorCode::Arg, "expect int"))
}

impl Command {
    /// Build a command from its arguments, taking ownership of them
    pub fn parse(args: Vec<Vec<u8>>) -> Result<Command, CommandError> {
        let name = args.first().map(Vec::as_slice).unwrap_or_default();
        let Some(ty) = CommandType::resolve(name, args.len()) else {
            return Err(CommandError::new(ErrorCode::Unknown, "unknown command"));
        };

        let mut args = args.into_iter().skip(1);
        let mut next = move || args.next().unwrap_or_default();

        let command = match ty {
            CommandType::Get => Command::Get { key: next() },
            CommandType::Set => Command::Set {
                key: next(),
                value: next(),
            },
            CommandType::Del => Command::Del { key: next() },
            CommandType::Keys => Command::Keys,
            CommandType::PExpire => {
                let key = next();
                let ttl_ms = parse_i64(&next())?;
                Command::PExpire { key, ttl_ms }
            }
            CommandType::PTtl => Command::PTtl { key: next() },
            CommandType::ZAdd => {
                let key = next();
                let score = parse_f64(&next())?;
                Command::ZAdd {
                    key,
                    score,
                    name: next(),
                }
            }
            CommandType::ZRem => Command::ZRem {
                key: next(),
                name: next(),
            },
            CommandType::ZScore => Command::ZScore {
                key: next(),
                name: next(),
            },
            CommandType::ZQuery => {
                let key = next();
                let score = parse_f64(&next())?;
                let name = next();
                let offset = parse_i64(&next())?;
                let limit = parse_i64(&next())?;
                Command::ZQuery {
                    key,
                    score,
                    name,
                    offset,
                    limit,
                }
            }
            CommandType::ZRank => Command::ZRank {
                key: next(),
                name: next(),
            },
            CommandType::ZCount => {
                let key = next();
                let score1 = parse_f64(&next())?;
                let name1 = next();
                let score2 = parse_f64(&next())?;
                let name2 = next();
                Command::ZCount {
                    key,
                    from: (score1, name1),
                    to: (score2, name2),
                }
            }
        };
        Ok(command)
    }

    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Get { .. } => CommandType::Get,
            Command::Set { .. } => CommandType::Set,
            Command::Del { .. } => CommandType::Del,
            Command::Keys => CommandType::Keys,
            Command::PExpire { .. } => CommandType::PExpire,
            Command::PTtl { .. } => CommandType::PTtl,
            Command::ZAdd { .. } => CommandType::ZAdd,
            Command::ZRem { .. } => CommandType::ZRem,
            Command::ZScore { .. } => CommandType::ZScore,
            Command::ZQuery { .. } => CommandType::ZQuery,
            Command::ZRank { .. } => CommandType::ZRank,
            Command::ZCount { .. } => CommandType::ZCount,
        }
    }
}
