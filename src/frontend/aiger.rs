use anyhow::{Context, Result, anyhow, bail, ensure};
use flate2::read::GzDecoder;
use std::io::{Read, Write};
use std::path::Path;

/// A latch as the file declares it: its own literal, the next-state
/// literal, and the initial value (`None` means uninitialised).
#[derive(Clone, Copy, Debug)]
pub struct AigerLatch {
    pub lit: u32,
    pub next: u32,
    pub init: Option<bool>,
}

/// An AIGER 1.9 file, literal-level. Both the ascii and the binary format
/// parse into this; gzipped input is transparently inflated.
#[derive(Clone, Default, Debug)]
pub struct Aiger {
    pub maxvar: u32,
    pub inputs: Vec<u32>,
    pub latches: Vec<AigerLatch>,
    pub outputs: Vec<u32>,
    pub bads: Vec<u32>,
    pub constraints: Vec<u32>,
    pub justice: Vec<Vec<u32>>,
    pub fairness: Vec<u32>,
    pub ands: Vec<(u32, u32, u32)>,
}

struct Tokens<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn skip_space(&mut self) {
        while self.pos < self.bytes.len() && (self.bytes[self.pos] == b' ') {
            self.pos += 1;
        }
    }

    fn number(&mut self) -> Result<u32> {
        self.skip_space();
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        ensure!(self.pos > start, "expected a number at byte {}", start);
        std::str::from_utf8(&self.bytes[start..self.pos])?
            .parse()
            .context("number out of range")
    }

    /// A number if the line has one left, consuming the newline otherwise.
    fn opt_number_on_line(&mut self) -> Result<Option<u32>> {
        self.skip_space();
        if self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            return Ok(Some(self.number()?));
        }
        Ok(None)
    }

    fn end_line(&mut self) -> Result<()> {
        self.skip_space();
        if self.pos >= self.bytes.len() {
            return Ok(());
        }
        ensure!(
            self.bytes[self.pos] == b'\n',
            "trailing bytes on line at byte {}",
            self.pos
        );
        self.pos += 1;
        Ok(())
    }

    fn byte(&mut self) -> Result<u8> {
        let b = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| anyhow!("unexpected end of file"))?;
        self.pos += 1;
        Ok(b)
    }

    // the binary format's 7-bit variable-length deltas
    fn delta(&mut self) -> Result<u32> {
        let mut x: u32 = 0;
        let mut shift = 0;
        loop {
            let b = self.byte()?;
            x |= ((b & 0x7f) as u32)
                .checked_shl(shift)
                .ok_or_else(|| anyhow!("delta encoding overflow"))?;
            if b & 0x80 == 0 {
                return Ok(x);
            }
            shift += 7;
        }
    }
}

impl Aiger {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut bytes =
            std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
        if bytes.starts_with(&[0x1f, 0x8b]) {
            let mut inflated = Vec::new();
            GzDecoder::new(&bytes[..])
                .read_to_end(&mut inflated)
                .with_context(|| format!("cannot inflate {}", path.display()))?;
            bytes = inflated;
        }
        Self::parse(&bytes).with_context(|| format!("malformed aiger in {}", path.display()))
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let binary = match bytes.split(|&b| b == b' ').next() {
            Some(b"aig") => true,
            Some(b"aag") => false,
            _ => bail!("missing aag/aig magic"),
        };
        let mut t = Tokens::new(bytes);
        t.pos = 3;
        let maxvar = t.number()?;
        let ni = t.number()?;
        let nl = t.number()?;
        let no = t.number()?;
        let na = t.number()?;
        let nb = t.opt_number_on_line()?.unwrap_or(0);
        let nc = t.opt_number_on_line()?.unwrap_or(0);
        let nj = t.opt_number_on_line()?.unwrap_or(0);
        let nf = t.opt_number_on_line()?.unwrap_or(0);
        t.end_line()?;
        let mut aiger = Aiger {
            maxvar,
            ..Default::default()
        };

        if binary {
            ensure!(
                maxvar as u64 == ni as u64 + nl as u64 + na as u64,
                "inconsistent binary header"
            );
            aiger.inputs = (0..ni).map(|i| 2 * (i + 1)).collect();
        } else {
            for _ in 0..ni {
                let l = t.number()?;
                ensure!(l & 1 == 0, "inverted input literal {l}");
                aiger.inputs.push(l);
                t.end_line()?;
            }
        }
        for i in 0..nl {
            let lit = if binary {
                2 * (ni + i + 1)
            } else {
                let l = t.number()?;
                ensure!(l & 1 == 0, "inverted latch literal {l}");
                l
            };
            let next = t.number()?;
            let init = match t.opt_number_on_line()? {
                None | Some(0) => Some(false),
                Some(1) => Some(true),
                Some(x) if x == lit => None,
                Some(x) => bail!("invalid latch reset {x}"),
            };
            aiger.latches.push(AigerLatch { lit, next, init });
            t.end_line()?;
        }
        for _ in 0..no {
            aiger.outputs.push(t.number()?);
            t.end_line()?;
        }
        for _ in 0..nb {
            aiger.bads.push(t.number()?);
            t.end_line()?;
        }
        for _ in 0..nc {
            aiger.constraints.push(t.number()?);
            t.end_line()?;
        }
        let mut sizes = Vec::new();
        for _ in 0..nj {
            sizes.push(t.number()?);
            t.end_line()?;
        }
        for s in sizes {
            let mut set = Vec::new();
            for _ in 0..s {
                set.push(t.number()?);
                t.end_line()?;
            }
            aiger.justice.push(set);
        }
        for _ in 0..nf {
            aiger.fairness.push(t.number()?);
            t.end_line()?;
        }
        for i in 0..na {
            if binary {
                let lhs = 2 * (ni + nl + i + 1);
                let d0 = t.delta()?;
                let rhs0 = lhs
                    .checked_sub(d0)
                    .ok_or_else(|| anyhow!("and delta underflow"))?;
                let d1 = t.delta()?;
                let rhs1 = rhs0
                    .checked_sub(d1)
                    .ok_or_else(|| anyhow!("and delta underflow"))?;
                aiger.ands.push((lhs, rhs0, rhs1));
            } else {
                let lhs = t.number()?;
                let rhs0 = t.number()?;
                let rhs1 = t.number()?;
                t.end_line()?;
                aiger.ands.push((lhs, rhs0, rhs1));
            }
        }
        // symbol table and comments are ignored
        Ok(aiger)
    }

    pub fn write_ascii<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        writeln!(
            w,
            "aag {} {} {} {} {} {} {} {} {}",
            self.maxvar,
            self.inputs.len(),
            self.latches.len(),
            self.outputs.len(),
            self.ands.len(),
            self.bads.len(),
            self.constraints.len(),
            self.justice.len(),
            self.fairness.len(),
        )?;
        for i in self.inputs.iter() {
            writeln!(w, "{i}")?;
        }
        for l in self.latches.iter() {
            match l.init {
                Some(false) => writeln!(w, "{} {}", l.lit, l.next)?,
                Some(true) => writeln!(w, "{} {} 1", l.lit, l.next)?,
                None => writeln!(w, "{} {} {}", l.lit, l.next, l.lit)?,
            }
        }
        for o in self.outputs.iter() {
            writeln!(w, "{o}")?;
        }
        for b in self.bads.iter() {
            writeln!(w, "{b}")?;
        }
        for c in self.constraints.iter() {
            writeln!(w, "{c}")?;
        }
        for j in self.justice.iter() {
            writeln!(w, "{}", j.len())?;
        }
        for j in self.justice.iter() {
            for l in j.iter() {
                writeln!(w, "{l}")?;
            }
        }
        for f in self.fairness.iter() {
            writeln!(w, "{f}")?;
        }
        for &(lhs, rhs0, rhs1) in self.ands.iter() {
            writeln!(w, "{lhs} {rhs0} {rhs1}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_ascii_format() {
        let src = b"aag 4 1 1 0 2 1 0 1 1\n2\n4 8 4\n7\n1\n6\n8\n6 2 4\n8 3 5\n";
        let a = Aiger::parse(src).unwrap();
        assert_eq!(a.maxvar, 4);
        assert_eq!(a.inputs, vec![2]);
        assert_eq!(a.latches.len(), 1);
        assert_eq!(a.latches[0].next, 8);
        assert_eq!(a.latches[0].init, None);
        assert_eq!(a.bads, vec![7]);
        assert_eq!(a.justice, vec![vec![6]]);
        assert_eq!(a.fairness, vec![8]);
        assert_eq!(a.ands, vec![(6, 2, 4), (8, 3, 5)]);
    }

    #[test]
    fn parses_the_binary_format() {
        // one input, one latch (next = and), one and gate 6 = 4 & 2
        let src = b"aig 3 1 1 0 1\n6 1\n\x02\x02";
        let a = Aiger::parse(src).unwrap();
        assert_eq!(a.inputs, vec![2]);
        assert_eq!(a.latches[0].lit, 4);
        assert_eq!(a.latches[0].next, 6);
        assert_eq!(a.latches[0].init, Some(true));
        assert_eq!(a.ands, vec![(6, 4, 2)]);
    }

    #[test]
    fn ascii_round_trips() {
        let src = b"aag 3 1 1 1 1 0 1\n2\n4 6\n6\n4\n6 4 2\n";
        let a = Aiger::parse(src).unwrap();
        let mut out = Vec::new();
        a.write_ascii(&mut out).unwrap();
        let b = Aiger::parse(&out).unwrap();
        assert_eq!(a.inputs, b.inputs);
        assert_eq!(a.constraints, b.constraints);
        assert_eq!(a.ands, b.ands);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Aiger::parse(b"definitely not aiger").is_err());
        assert!(Aiger::parse(b"aag 1 1\n").is_err());
    }
}
