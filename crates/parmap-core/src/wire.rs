//! Line-delimited JSON exchanged between a [`ProcessPool`](crate::ProcessPool)
//! and its worker processes. One request line in, one response line out.

use std::io::{BufRead, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: usize,
    pub func: String,
    pub args: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: usize,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Response {
    pub fn from_outcome(id: usize, outcome: std::result::Result<Value, String>) -> Self {
        match outcome {
            Ok(value) => Self {
                id,
                result: Some(value),
                error: None,
            },
            Err(message) => Self {
                id,
                result: None,
                error: Some(message),
            },
        }
    }

    /// `Err` if the worker reported an invocation error. A missing result
    /// reads as `null`, the encoding of `()`.
    pub fn into_outcome(self) -> std::result::Result<Value, String> {
        match self.error {
            Some(message) => Err(message),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Write one message as a single line and flush. Write failures surface as
/// [`Error::IO`](crate::Error::IO).
pub fn write_line<W: Write, T: Serialize>(out: &mut W, message: &T) -> Result<()> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    out.write_all(&line)?;
    out.flush()?;
    Ok(())
}

/// Read the next message. `Ok(None)` at end of stream; blank lines are skipped.
pub fn read_line<R: BufRead, T: DeserializeOwned>(input: &mut R) -> Result<Option<T>> {
    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if !line.trim().is_empty() {
            return Ok(Some(serde_json::from_str(line.trim_end())?));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    #[test]
    fn request_line_format() {
        let mut buf = Vec::new();
        let request = Request {
            id: 4,
            func: "add".into(),
            args: json!([1, 2]),
        };
        write_line(&mut buf, &request).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "{\"id\":4,\"func\":\"add\",\"args\":[1,2]}\n"
        );
    }

    #[test]
    fn reads_lines_until_eof() {
        let mut input = Cursor::new(
            "{\"id\":0,\"result\":1}\n\n{\"id\":1,\"error\":\"boom\"}\n".as_bytes(),
        );
        let first: Response = read_line(&mut input).unwrap().unwrap();
        assert_eq!(first.into_outcome(), Ok(json!(1)));
        let second: Response = read_line(&mut input).unwrap().unwrap();
        assert_eq!(second.id, 1);
        assert_eq!(second.into_outcome(), Err("boom".to_string()));
        let end: Option<Response> = read_line(&mut input).unwrap();
        assert!(end.is_none());
    }

    #[test]
    fn unit_result_reads_as_null() {
        let response = Response::from_outcome(2, Ok(Value::Null));
        let mut buf = Vec::new();
        write_line(&mut buf, &response).unwrap();
        let back: Response = read_line(&mut Cursor::new(buf)).unwrap().unwrap();
        assert_eq!(back.into_outcome(), Ok(Value::Null));
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn broken_pipe_is_an_io_error() {
        let request = Request {
            id: 0,
            func: "square".into(),
            args: json!(1),
        };
        match write_line(&mut ClosedPipe, &request) {
            Err(crate::Error::IO(e)) => assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe),
            other => panic!("expected io error, got {:?}", other),
        }
    }

    #[test]
    fn malformed_line_is_an_error() {
        let mut input = Cursor::new("not json\n".as_bytes());
        let parsed: Result<Option<Response>> = read_line(&mut input);
        assert!(parsed.is_err());
    }
}
