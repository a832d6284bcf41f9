//! Operator-facing progress log
//!
//! Blobs already at the target tier print a bare `.` so a long run of them
//! collapses into one visual line; everything else prints a full line.

use std::fmt;
use std::io::{self, Write};

pub struct ProgressLog<W> {
    out: W,
}

impl<W: Write> ProgressLog<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn line(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        self.out.write_fmt(args)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }

    pub fn marker(&mut self) -> io::Result<()> {
        self.out.write_all(b".")?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
