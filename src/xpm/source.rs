//! Reading the strings of an XPM file
//!
//! An XPM image is a C array of strings; the decoder only needs the strings
//! themselves, in order. The reader here is deliberately forgiving about the
//! C syntax around them: it looks for the word `XPM`, then for the opening
//! `{` of the array, and then returns each following double-quoted string.

use std::fmt;
use std::io::{BufRead, Bytes};

/// Initial capacity of the buffer holding the current string
const INITIAL_BUFFER_SIZE: usize = 10;

/// Words longer than this are split when looking for the `XPM` marker
const MAX_WORD_LEN: usize = 1023;

/// A sequence of XPM strings.
///
/// Each method returns the next string of the corresponding part of the file,
/// without its quotes, or `None` once the input is exhausted or unreadable.
/// The returned slice is only valid until the next call.
pub trait XpmSource {
    /// Skip to the start of the image array and return its first string.
    fn read_header(&mut self) -> Option<&[u8]>;
    /// Return the next string, skipping any C comments before it.
    fn read_colormap_row(&mut self) -> Option<&[u8]>;
    /// Return the next string.
    fn read_body_row(&mut self) -> Option<&[u8]>;
    /// Take the I/O error which ended the input, if there was one.
    fn take_io_error(&mut self) -> Option<std::io::Error> {
        None
    }
}

/// Location of a byte in the input stream.
///
/// Includes byte offset (for format debugging with hex editor) and
/// line:column offset (for format debugging with text editor)
#[derive(Clone, Copy, Debug)]
pub(crate) struct TextLocation {
    byte: u64,
    line: u64,
    column: u64,
}

impl fmt::Display for TextLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            "byte={},line={}:col={}",
            self.byte, self.line, self.column
        ))
    }
}

/// A peekable reader which tracks location information
struct TextReader<R> {
    inner: R,

    current: Option<u8>,

    location: TextLocation,
}

impl<R> TextReader<R>
where
    R: Iterator<Item = u8>,
{
    /// Initialize a TextReader
    fn new(mut r: R) -> TextReader<R> {
        let current = r.next();
        TextReader {
            inner: r,
            current,
            location: TextLocation {
                byte: 0,
                line: 1,
                column: 0,
            },
        }
    }

    /// Consume the next byte. On EOF, will return None
    fn next(&mut self) -> Option<u8> {
        self.current?;

        let mut current = self.inner.next();
        std::mem::swap(&mut self.current, &mut current);

        self.location.byte += 1;
        self.location.column += 1;
        if let Some(b'\n') = current {
            self.location.line += 1;
            self.location.column = 0;
        }
        current
    }
    /// Peek at the next byte. On EOF, will return None
    fn peek(&self) -> Option<u8> {
        self.current
    }
    /// The location of the last byte returned by [Self::next]
    fn loc(&self) -> TextLocation {
        self.location
    }
}

/// Helper struct to project BufRead down to Iterator<Item=u8>. Costs of this simple
/// lifetime-free abstraction include that the struct requires space to store the
/// error value, and that code using this must eventually check the error field.
struct IoAdapter<R> {
    reader: Bytes<R>,
    error: Option<std::io::Error>,
}

impl<R> Iterator for IoAdapter<R>
where
    R: BufRead,
{
    type Item = u8;
    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        if self.error.is_some() {
            return None;
        }
        match self.reader.next() {
            None => None,
            Some(Ok(v)) => Some(v),
            Some(Err(e)) => {
                self.error = Some(e);
                None
            }
        }
    }
}

/// Whitespace as understood by C's `isspace`
pub(crate) fn is_c_space(x: u8) -> bool {
    matches!(x, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

/// [XpmSource] reading an XPM file from a byte stream
pub struct StreamSource<R> {
    r: TextReader<IoAdapter<R>>,
    /// Contents of the most recently read string; grows by doubling
    buffer: Vec<u8>,
}

impl<R> StreamSource<R>
where
    R: BufRead,
{
    pub fn new(reader: R) -> StreamSource<R> {
        StreamSource {
            r: TextReader::new(IoAdapter {
                reader: reader.bytes(),
                error: None,
            }),
            buffer: Vec::with_capacity(INITIAL_BUFFER_SIZE),
        }
    }

    /// Location just after the last byte consumed
    pub(crate) fn location(&self) -> TextLocation {
        self.r.loc()
    }

    /// Skip whitespace separated words until one equals `s`.
    fn seek_word(&mut self, s: &[u8]) -> bool {
        let mut word = [0u8; MAX_WORD_LEN];
        loop {
            while let Some(b) = self.r.peek() {
                if !is_c_space(b) {
                    break;
                }
                self.r.next();
            }
            if self.r.peek().is_none() {
                return false;
            }

            let mut len = 0;
            while let Some(b) = self.r.peek() {
                if is_c_space(b) || len >= word.len() {
                    break;
                }
                word[len] = b;
                len += 1;
                self.r.next();
            }
            if &word[..len] == s {
                return true;
            }
        }
    }

    /// Consume bytes up to and including `c`, skipping `/* comments */`.
    ///
    /// A `/` which does not start a comment swallows the byte after it.
    fn seek_char(&mut self, c: u8) -> bool {
        while let Some(b) = self.r.next() {
            if b == c {
                return true;
            }
            if b == b'/' {
                match self.r.next() {
                    None => return false,
                    Some(b'*') => {
                        if !self.skip_comment_body() {
                            return false;
                        }
                    }
                    Some(_) => (),
                }
            }
        }
        false
    }

    /// Consume the rest of a comment, up to and including `*/`
    fn skip_comment_body(&mut self) -> bool {
        let mut prev = None;
        while let Some(b) = self.r.next() {
            if prev == Some(b'*') && b == b'/' {
                return true;
            }
            prev = Some(b);
        }
        false
    }

    /// Consume bytes up to and including the next `"`, without regard for comments
    fn seek_quote(&mut self) -> bool {
        while let Some(b) = self.r.next() {
            if b == b'"' {
                return true;
            }
        }
        false
    }

    /// Read the contents of a string whose opening quote was already consumed,
    /// up to and including the closing quote.
    fn read_string_contents(&mut self) -> Option<&[u8]> {
        self.buffer.clear();
        loop {
            let b = self.r.next()?;
            if b == b'"' {
                return Some(self.buffer.as_slice());
            }
            if self.buffer.len() == self.buffer.capacity() {
                let size = self.buffer.capacity().max(1);
                let new_size = size.checked_mul(2)?;
                self.buffer
                    .try_reserve_exact(new_size - self.buffer.len())
                    .ok()?;
            }
            self.buffer.push(b);
        }
    }
}

impl<R> XpmSource for StreamSource<R>
where
    R: BufRead,
{
    fn read_header(&mut self) -> Option<&[u8]> {
        if !self.seek_word(b"XPM") || !self.seek_char(b'{') {
            return None;
        }
        self.read_colormap_row()
    }

    fn read_colormap_row(&mut self) -> Option<&[u8]> {
        if !self.seek_char(b'"') {
            return None;
        }
        self.read_string_contents()
    }

    fn read_body_row(&mut self) -> Option<&[u8]> {
        if !self.seek_quote() {
            return None;
        }
        self.read_string_contents()
    }

    fn take_io_error(&mut self) -> Option<std::io::Error> {
        self.r.inner.error.take()
    }
}
