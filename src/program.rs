use std::str::FromStr;

/// An error that occurred while parsing program text
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
  #[error("line {line}: {text:?} is not a binary byte literal")]
  InvalidLiteral { line: usize, text: String },
}

/// A `Program` is a binary image that our virtual machine may load into
/// memory at address 0 and execute.
///
/// The text format is one byte per line, written as a base-2 literal. A `#`
/// starts a comment running to the end of the line; blank lines (before or
/// after comment stripping) are skipped.
#[derive(Debug)]
pub struct Program {
  bytes: Vec<u8>,
}

impl Program {
  pub fn bytes(&self) -> &[u8] {
    &self.bytes
  }
}

impl From<Vec<u8>> for Program {
  fn from(bytes: Vec<u8>) -> Self {
    Self { bytes }
  }
}

impl FromStr for Program {
  type Err = ParseError;

  fn from_str(source: &str) -> Result<Self, ParseError> {
    let mut bytes = Vec::new();
    for (number, line) in source.lines().enumerate() {
      let text = line.split('#').next().unwrap_or("").trim();
      if text.is_empty() {
        continue;
      }
      let byte = u8::from_str_radix(text, 2).map_err(|_| ParseError::InvalidLiteral {
        line: number + 1,
        text: text.to_owned(),
      })?;
      bytes.push(byte);
    }
    Ok(Self { bytes })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_bytes() {
    let program: Program = "10000010\n00000000\n00001000\n".parse().unwrap();
    assert_eq!(program.bytes(), &[0b1000_0010, 0, 8]);
  }

  #[test]
  fn parse_skips_comments_and_blanks() {
    let source = "# a whole-line comment\n\n10000010 # LDI r0, 8\n   \n00000000\n00001000\n";
    let program: Program = source.parse().unwrap();
    assert_eq!(program.bytes(), &[0b1000_0010, 0, 8]);
  }

  #[test]
  fn parse_empty_source() {
    let program: Program = "# nothing but comments\n".parse().unwrap();
    assert!(program.bytes().is_empty());
  }

  #[test]
  fn parse_rejects_bad_literal() {
    let err = "10000010\n2222\n".parse::<Program>().unwrap_err();
    assert!(matches!(
      err,
      ParseError::InvalidLiteral { line: 2, ref text } if text == "2222"
    ));
  }

  #[test]
  fn parse_rejects_overlong_literal() {
    // nine bits does not fit a byte
    let err = "100000101\n".parse::<Program>().unwrap_err();
    assert!(matches!(err, ParseError::InvalidLiteral { line: 1, .. }));
  }

  #[test]
  fn from_raw_bytes() {
    let program: Program = vec![0b0000_0001].into();
    assert_eq!(program.bytes(), &[1]);
  }
}
