use std::fmt;

use chrono::NaiveDate;

use crate::model::{CourtId, SlotKey, SlotTime};

/// Parsed command from one protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Auth { user: String, password: String },
    WhoAmI,
    List {
        date: NaiveDate,
        start: Option<SlotTime>,
        end: Option<SlotTime>,
    },
    Book { key: SlotKey },
    Lock { key: SlotKey },
    Unlock { key: SlotKey },
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    UnknownCommand(String),
    Usage(&'static str),
    BadDate(String),
    BadTime(String),
    BadCourt(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty command"),
            ParseError::UnknownCommand(word) => write!(f, "unknown command: {word}"),
            ParseError::Usage(usage) => write!(f, "usage: {usage}"),
            ParseError::BadDate(s) => write!(f, "bad date (want YYYY-MM-DD): {s}"),
            ParseError::BadTime(s) => write!(f, "bad time (want HH:MM on the 30-minute grid): {s}"),
            ParseError::BadCourt(s) => write!(f, "bad court (want 1..=9): {s}"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse one line. Keywords are case-insensitive; arguments are not.
pub fn parse(line: &str) -> Result<Command, ParseError> {
    let mut words = line.split_whitespace();
    let keyword = words.next().ok_or(ParseError::Empty)?.to_ascii_uppercase();
    let args: Vec<&str> = words.collect();

    match keyword.as_str() {
        "AUTH" => match args.as_slice() {
            [user, password] => Ok(Command::Auth {
                user: (*user).to_string(),
                password: (*password).to_string(),
            }),
            _ => Err(ParseError::Usage("AUTH <user> <password>")),
        },
        "WHOAMI" => Ok(Command::WhoAmI),
        "LIST" => match args.as_slice() {
            [date] => Ok(Command::List { date: parse_date(date)?, start: None, end: None }),
            [date, start, end] => Ok(Command::List {
                date: parse_date(date)?,
                start: Some(parse_time(start)?),
                end: Some(parse_time(end)?),
            }),
            _ => Err(ParseError::Usage("LIST <date> [<start> <end>]")),
        },
        "BOOK" => Ok(Command::Book { key: parse_key(&args, "BOOK <date> <time> <court>")? }),
        "LOCK" => Ok(Command::Lock { key: parse_key(&args, "LOCK <date> <time> <court>")? }),
        "UNLOCK" => Ok(Command::Unlock { key: parse_key(&args, "UNLOCK <date> <time> <court>")? }),
        "QUIT" => Ok(Command::Quit),
        _ => Err(ParseError::UnknownCommand(keyword)),
    }
}

fn parse_key(args: &[&str], usage: &'static str) -> Result<SlotKey, ParseError> {
    let [date, time, court] = args else {
        return Err(ParseError::Usage(usage));
    };
    Ok(SlotKey::new(
        parse_date(date)?,
        parse_time(time)?,
        parse_court(court)?,
    ))
}

fn parse_date(s: &str) -> Result<NaiveDate, ParseError> {
    s.parse().map_err(|_| ParseError::BadDate(s.to_string()))
}

fn parse_time(s: &str) -> Result<SlotTime, ParseError> {
    SlotTime::parse(s).ok_or_else(|| ParseError::BadTime(s.to_string()))
}

fn parse_court(s: &str) -> Result<CourtId, ParseError> {
    s.parse::<u8>()
        .ok()
        .and_then(CourtId::new)
        .ok_or_else(|| ParseError::BadCourt(s.to_string()))
}
