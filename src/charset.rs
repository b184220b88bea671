/*!
Symbol-set compiler: regex-class dialect -> 256-bit match column.

Recognized syntax:
- `*` (exactly): all 256 bytes.
- `.` (exactly): every byte except `\n`. This matches the behavior of the
  Micron apcompile toolchain, which treats `symbol-set="."` as `[^\x0a]`.
- `[...]` bracketed class; a leading unescaped `^` inverts the whole class.
- Byte ranges `a-b`, inclusive.
- Hex escapes `\xHH` (exactly two hex digits).
- Short escapes `\n \r \t \a \b \f \v \' \" \\ \-`.
- Classes `\s` (space, tab, CR, LF, VT, FF), `\d` (0-9), `\w` ([0-9A-Za-z_]).
- Any other byte is a literal; escaping a byte with no special meaning
  yields the byte itself.

Inversion is applied once after the full traversal, so `[^a-z\d]` flips the
union of everything seen. Unbalanced brackets are a malformed-automaton
error. `{...}` wrappers (AP counter macros) are reserved and rejected.

The inverse direction, [`column_to_charset`], emits a canonical bracketed
hex form collapsing consecutive bytes into `\xHH-\xHH` ranges; recompiling
that form reproduces the column bit for bit.
*/

use crate::bitset::Bitset256;
use crate::errors::AutomatonError;

/// Compile a symbol-set string into its match column.
pub fn parse_symbol_set(symbol_set: &str) -> Result<Bitset256, AutomatonError> {
    let mut column = Bitset256::new();

    if symbol_set == "*" {
        return Ok(Bitset256::full());
    }

    if symbol_set == "." {
        column.set(b'\n');
        column.invert();
        return Ok(column);
    }

    let bytes = symbol_set.as_bytes();

    // {###} counter-macro wrappers are reserved syntax.
    if bytes.len() >= 2 && bytes[0] == b'{' && bytes[bytes.len() - 1] == b'}' {
        return Err(AutomatonError::MalformedAutomaton(format!(
            "curly-brace symbol set {symbol_set:?} is not supported"
        )));
    }

    // Open-range bookkeeping shared by every literal emission.
    struct ClassState {
        range_pending: bool,
        range_start: u8,
        last_byte: u8,
    }

    // Record one literal byte: sets its bit, closes a pending range, and
    // becomes the candidate left endpoint of the next range.
    fn emit(column: &mut Bitset256, st: &mut ClassState, c: u8) {
        column.set(c);
        if st.range_pending {
            column.set_range(st.range_start, c);
            st.range_pending = false;
        }
        st.last_byte = c;
    }

    let mut st = ClassState {
        range_pending: false,
        range_start: 0,
        last_byte: 0,
    };
    let mut escaped = false;
    let mut inverting = false;
    let mut bracket_sem: i32 = 0;

    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b'[' if !escaped => bracket_sem += 1,
            b']' if !escaped => bracket_sem -= 1,
            b'\\' if !escaped => escaped = true,
            b'^' if !escaped => inverting = true,
            b'-' if !escaped => {
                st.range_pending = true;
                st.range_start = st.last_byte;
            }
            _ if escaped => {
                escaped = false;
                match c {
                    b'n' => emit(&mut column, &mut st, b'\n'),
                    b'r' => emit(&mut column, &mut st, b'\r'),
                    b't' => emit(&mut column, &mut st, b'\t'),
                    b'a' => emit(&mut column, &mut st, 0x07),
                    b'b' => emit(&mut column, &mut st, 0x08),
                    b'f' => emit(&mut column, &mut st, 0x0C),
                    b'v' => emit(&mut column, &mut st, 0x0B),
                    b'x' => {
                        let hex = bytes.get(i + 1..i + 3).ok_or_else(|| {
                            AutomatonError::MalformedAutomaton(format!(
                                "truncated hex escape in symbol set {symbol_set:?}"
                            ))
                        })?;
                        let value = u8::from_str_radix(
                            std::str::from_utf8(hex).map_err(|_| bad_hex(symbol_set))?,
                            16,
                        )
                        .map_err(|_| bad_hex(symbol_set))?;
                        i += 2;
                        emit(&mut column, &mut st, value);
                    }
                    b's' => {
                        // Whitespace class: no range interaction, mirrors the
                        // hardware toolchain.
                        for w in [b'\n', b'\t', b'\r', 0x0B, 0x0C, 0x20] {
                            column.set(w);
                        }
                    }
                    b'd' => column.set_range(b'0', b'9'),
                    b'w' => {
                        column.set(b'_');
                        column.set_range(b'0', b'9');
                        column.set_range(b'A', b'Z');
                        column.set_range(b'a', b'z');
                    }
                    // Escaping anything else yields the byte itself
                    // (covers \' \" \\ \- \[ \] \^ and stray escapes).
                    _ => emit(&mut column, &mut st, c),
                }
            }
            _ => emit(&mut column, &mut st, c),
        }
        i += 1;
    }

    if bracket_sem != 0 {
        return Err(AutomatonError::MalformedAutomaton(format!(
            "unbalanced brackets in symbol set {symbol_set:?}"
        )));
    }

    if inverting {
        column.invert();
    }

    Ok(column)
}

fn bad_hex(symbol_set: &str) -> AutomatonError {
    AutomatonError::MalformedAutomaton(format!(
        "invalid hex escape in symbol set {symbol_set:?}"
    ))
}

/// Emit the canonical bracketed hex form of a column.
///
/// Consecutive bytes collapse into `\xHH-\xHH` ranges, so `[abc]` becomes
/// `[\x61-\x63]`. Recompiling the result reproduces the input column.
pub fn column_to_charset(column: &Bitset256) -> String {
    let mut out = String::from("[");

    let mut last: u16 = 0;
    let mut first = true;
    let mut in_range = false;
    for i in 0u16..256 {
        if !column.test(i as u8) {
            continue;
        }
        if first {
            last = i;
            first = false;
        }
        if !in_range {
            if last == i.wrapping_sub(1) {
                in_range = true;
                out.push('-');
            } else {
                out.push_str(&format!("\\x{:02x}", i));
            }
        } else if last != i - 1 {
            // The run ended at `last`; emit its right endpoint and the new
            // isolated value.
            out.push_str(&format!("\\x{:02x}", last));
            out.push_str(&format!("\\x{:02x}", i));
            in_range = false;
        }
        last = i;
    }
    if in_range {
        out.push_str(&format!("\\x{:02x}", last));
    }

    out.push(']');
    out
}

/// Quine-McCluskey complexity score of a column.
///
/// The score is the literal count of a minimized sum-of-products cover over
/// the eight input bits: an informational measure of how expensive the
/// character class is as combinational logic. Zero means the class is empty
/// or covers all 256 bytes.
pub fn qm_complexity(column: &Bitset256) -> u32 {
    const VARS: u32 = 8;

    #[derive(Clone, PartialEq, Eq)]
    struct Implicant {
        value: u16,
        mask: u16, // bits that became don't-cares
    }

    let minterms: Vec<u16> = column.ones().map(|b| b as u16).collect();
    if minterms.is_empty() || minterms.len() == 256 {
        return 0;
    }

    let mut current: Vec<Implicant> = minterms
        .iter()
        .map(|&m| Implicant { value: m, mask: 0 })
        .collect();
    let mut primes: Vec<Implicant> = Vec::new();

    while !current.is_empty() {
        let mut used = vec![false; current.len()];
        let mut next: Vec<Implicant> = Vec::new();

        for i in 0..current.len() {
            for j in (i + 1)..current.len() {
                let (a, b) = (&current[i], &current[j]);
                if a.mask != b.mask {
                    continue;
                }
                let diff = a.value ^ b.value;
                if diff.count_ones() == 1 {
                    used[i] = true;
                    used[j] = true;
                    let merged = Implicant {
                        value: a.value & !diff,
                        mask: a.mask | diff,
                    };
                    if !next.contains(&merged) {
                        next.push(merged);
                    }
                }
            }
        }

        for (imp, was_used) in current.iter().zip(used.iter()) {
            if !*was_used && !primes.contains(imp) {
                primes.push(imp.clone());
            }
        }
        current = next;
    }

    let covers = |imp: &Implicant, m: u16| (m & !imp.mask) == (imp.value & !imp.mask);

    // Essential primes first, then greedy cover of the remainder.
    let mut remaining: Vec<u16> = minterms.clone();
    let mut chosen: Vec<usize> = Vec::new();
    for &m in &minterms {
        let mut hits: Vec<usize> = Vec::new();
        for (i, p) in primes.iter().enumerate() {
            if covers(p, m) {
                hits.push(i);
            }
        }
        if hits.len() == 1 && !chosen.contains(&hits[0]) {
            chosen.push(hits[0]);
        }
    }
    remaining.retain(|&m| !chosen.iter().any(|&i| covers(&primes[i], m)));
    while !remaining.is_empty() {
        let best = (0..primes.len())
            .filter(|i| !chosen.contains(i))
            .max_by_key(|&i| remaining.iter().filter(|&&m| covers(&primes[i], m)).count());
        match best {
            Some(i) => {
                chosen.push(i);
                remaining.retain(|&m| !covers(&primes[i], m));
            }
            None => break,
        }
    }

    chosen
        .iter()
        .map(|&i| VARS - primes[i].mask.count_ones())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ones(s: &str) -> Vec<u8> {
        parse_symbol_set(s).unwrap().ones().collect()
    }

    #[test]
    fn star_and_dot() {
        assert_eq!(parse_symbol_set("*").unwrap().count(), 256);
        let dot = parse_symbol_set(".").unwrap();
        assert_eq!(dot.count(), 255);
        assert!(!dot.test(b'\n'));
    }

    #[test]
    fn literals_and_ranges() {
        assert_eq!(ones("[abc]"), vec![b'a', b'b', b'c']);
        assert_eq!(ones("[a-d]"), vec![b'a', b'b', b'c', b'd']);
        assert_eq!(ones("[0-9A-F]").len(), 16);
        // Unbracketed forms are accepted the same way.
        assert_eq!(ones("a"), vec![b'a']);
    }

    #[test]
    fn escapes() {
        assert_eq!(ones(r"[\n\r\t]"), vec![b'\t', b'\n', b'\r']);
        assert_eq!(ones(r"[\x41\x5a]"), vec![0x41, 0x5A]);
        assert_eq!(ones(r"[\x00-\x02]"), vec![0, 1, 2]);
        // Escaped dash and backslash are literals.
        assert_eq!(ones(r"[\-]"), vec![b'-']);
        assert_eq!(ones(r"[\\]"), vec![b'\\']);
        // Escaped brackets do not change nesting.
        assert_eq!(ones(r"[\[\]]"), vec![b'[', b']']);
    }

    #[test]
    fn classes() {
        assert_eq!(ones(r"[\d]").len(), 10);
        let w = parse_symbol_set(r"[\w]").unwrap();
        assert_eq!(w.count(), 63);
        assert!(w.test(b'_') && w.test(b'z') && w.test(b'A') && w.test(b'0'));
        let s = parse_symbol_set(r"[\s]").unwrap();
        assert_eq!(s.count(), 6);
        assert!(s.test(0x20) && s.test(b'\n') && s.test(0x0B));
    }

    #[test]
    fn inversion_is_complement() {
        for set in ["[abc]", "[a-z]", r"[\d\s]", r"[\x00-\x7f]"] {
            let plain = parse_symbol_set(set).unwrap();
            let inverted =
                parse_symbol_set(&format!("[^{}]", &set[1..set.len() - 1])).unwrap();
            let mut flipped = plain;
            flipped.invert();
            assert_eq!(inverted, flipped, "complement law failed for {set}");
        }
    }

    #[test]
    fn malformed_sets_are_rejected() {
        assert!(parse_symbol_set("[abc").is_err());
        assert!(parse_symbol_set("abc]").is_err());
        assert!(parse_symbol_set(r"[\x4]").is_err());
        assert!(parse_symbol_set("{4}").is_err());
    }

    #[test]
    fn canonical_form_round_trips() {
        for set in ["[abc]", "[a-zA-Z]", "*", r"[^\n]", r"[\x00]", r"[\xfe\xff]"] {
            let column = parse_symbol_set(set).unwrap();
            let canon = column_to_charset(&column);
            let back = parse_symbol_set(&canon).unwrap();
            assert_eq!(column, back, "round trip failed for {set} via {canon}");
        }
    }

    #[test]
    fn canonical_form_collapses_runs() {
        let column = parse_symbol_set("[abc]").unwrap();
        assert_eq!(column_to_charset(&column), r"[\x61-\x63]");
        let column = parse_symbol_set("[a]").unwrap();
        assert_eq!(column_to_charset(&column), r"[\x61]");
        let column = parse_symbol_set("[ac]").unwrap();
        assert_eq!(column_to_charset(&column), r"[\x61\x63]");
    }

    #[test]
    fn determinism() {
        for set in ["[a-f0-3]", r"[\w]", "*", "[^x]"] {
            assert_eq!(
                parse_symbol_set(set).unwrap(),
                parse_symbol_set(set).unwrap()
            );
        }
    }

    #[test]
    fn qm_score_edges() {
        assert_eq!(qm_complexity(&Bitset256::new()), 0);
        assert_eq!(qm_complexity(&Bitset256::full()), 0);
        // A single byte needs all eight literals.
        let one = parse_symbol_set(r"[\x00]").unwrap();
        assert_eq!(qm_complexity(&one), 8);
        // The low half of the alphabet is a single literal (bit 7 = 0).
        let half = parse_symbol_set(r"[\x00-\x7f]").unwrap();
        assert_eq!(qm_complexity(&half), 1);
    }
}
