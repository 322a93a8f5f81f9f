use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::{Index, IndexMut, Range};

/// Role of a line in a diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffTag {
    Equal,
    Insert,
    Delete,
}

impl DiffTag {
    /// Display prefix used by [`format_diff_for_display`]
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Equal => "  ",
            Self::Insert => "+ ",
            Self::Delete => "- ",
        }
    }
}

/// One line of a diff, terminator included
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub tag: DiffTag,
    pub line: String,
}

impl DiffLine {
    fn new(tag: DiffTag, line: &str) -> Self {
        Self {
            tag,
            line: line.to_string(),
        }
    }
}

/// Line counts per tag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub unchanged: usize,
    pub insertions: usize,
    pub deletions: usize,
}

/// Ordered line-level diff between two texts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    lines: Vec<DiffLine>,
}

impl Diff {
    #[must_use]
    pub fn lines(&self) -> &[DiffLine] {
        &self.lines
    }

    pub fn iter(&self) -> impl Iterator<Item = (DiffTag, &str)> + '_ {
        self.lines.iter().map(|l| (l.tag, l.line.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// True iff any line was inserted or deleted
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.lines.iter().any(|l| l.tag != DiffTag::Equal)
    }

    #[must_use]
    pub fn stats(&self) -> DiffStats {
        let mut stats = DiffStats::default();
        for line in &self.lines {
            match line.tag {
                DiffTag::Equal => stats.unchanged += 1,
                DiffTag::Insert => stats.insertions += 1,
                DiffTag::Delete => stats.deletions += 1,
            }
        }
        stats
    }

    #[must_use]
    pub fn format_for_display(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line.tag.prefix());
            out.push_str(&line.line);
        }
        out
    }
}

/// Compute a line diff from `old_text` to `new_text`.
///
/// Lines keep their terminators. The script is a shortest edit script
/// (Myers, linear space); inside every run of changes deletions come
/// before insertions so the output is stable for identical inputs.
#[must_use]
pub fn generate_diff(old_text: &str, new_text: &str) -> Diff {
    let old: Vec<&str> = old_text.split_inclusive('\n').collect();
    let new: Vec<&str> = new_text.split_inclusive('\n').collect();

    let mut engine = LineDiff::new(&old, &new);
    engine.conquer(0..old.len(), 0..new.len());
    let mut lines = engine.out;
    deletions_first(&mut lines);

    Diff { lines }
}

/// Divide-and-conquer Myers diff over interned lines
struct LineDiff<'a> {
    old: &'a [&'a str],
    new: &'a [&'a str],
    a: Vec<usize>,
    b: Vec<usize>,
    forward: Frontier,
    backward: Frontier,
    out: Vec<DiffLine>,
}

impl<'a> LineDiff<'a> {
    fn new(old: &'a [&'a str], new: &'a [&'a str]) -> Self {
        let mut ids: HashMap<&str, usize> = HashMap::new();
        let mut intern = |line: &'a str| {
            let next = ids.len();
            *ids.entry(line).or_insert(next)
        };
        let a = old.iter().map(|&line| intern(line)).collect();
        let b = new.iter().map(|&line| intern(line)).collect();

        let max_d = max_d(old.len(), new.len());
        Self {
            old,
            new,
            a,
            b,
            forward: Frontier::new(max_d),
            backward: Frontier::new(max_d),
            out: Vec::with_capacity(old.len().max(new.len())),
        }
    }

    fn conquer(&mut self, mut old: Range<usize>, mut new: Range<usize>) {
        let prefix = common_prefix(&self.a[old.clone()], &self.b[new.clone()]);
        self.emit(DiffTag::Equal, old.start..old.start + prefix);
        old.start += prefix;
        new.start += prefix;

        let suffix = common_suffix(&self.a[old.clone()], &self.b[new.clone()]);
        let tail = old.end - suffix..old.end;
        old.end -= suffix;
        new.end -= suffix;

        if old.is_empty() || new.is_empty() {
            self.emit(DiffTag::Delete, old);
            self.emit(DiffTag::Insert, new);
        } else {
            let (n, m) = (old.len(), new.len());
            let split = middle_snake(
                &self.a[old.clone()],
                &self.b[new.clone()],
                &mut self.forward,
                &mut self.backward,
            );
            match split {
                Some((x, y)) if x <= n && y <= m && (x, y) != (0, 0) && (x, y) != (n, m) => {
                    self.conquer(old.start..old.start + x, new.start..new.start + y);
                    self.conquer(old.start + x..old.end, new.start + y..new.end);
                }
                _ => {
                    self.emit(DiffTag::Delete, old);
                    self.emit(DiffTag::Insert, new);
                }
            }
        }

        self.emit(DiffTag::Equal, tail);
    }

    fn emit(&mut self, tag: DiffTag, range: Range<usize>) {
        let source = if tag == DiffTag::Insert { self.new } else { self.old };
        self.out.extend(source[range].iter().map(|line| DiffLine::new(tag, line)));
    }
}

fn max_d(old_len: usize, new_len: usize) -> usize {
    (old_len + new_len + 1) / 2 + 1
}

/// Furthest-reaching x per diagonal `k`, indexed from `-max_d` to `max_d`
struct Frontier {
    offset: isize,
    v: Vec<usize>,
}

impl Frontier {
    fn new(max_d: usize) -> Self {
        Self {
            offset: max_d as isize + 1,
            v: vec![0; 2 * max_d + 3],
        }
    }
}

impl Index<isize> for Frontier {
    type Output = usize;

    fn index(&self, k: isize) -> &usize {
        &self.v[(k + self.offset) as usize]
    }
}

impl IndexMut<isize> for Frontier {
    fn index_mut(&mut self, k: isize) -> &mut usize {
        &mut self.v[(k + self.offset) as usize]
    }
}

/// Split point of a shortest edit script, found by running the search
/// from both ends until the paths overlap
fn middle_snake(
    a: &[usize],
    b: &[usize],
    forward: &mut Frontier,
    backward: &mut Frontier,
) -> Option<(usize, usize)> {
    let (n, m) = (a.len(), b.len());
    let delta = n as isize - m as isize;
    let odd = delta & 1 == 1;
    forward[1] = 0;
    backward[1] = 0;

    for d in 0..max_d(n, m) as isize {
        for k in (-d..=d).rev().step_by(2) {
            let mut x = if k == -d || (k != d && forward[k - 1] < forward[k + 1]) {
                forward[k + 1]
            } else {
                forward[k - 1] + 1
            };
            let y = (x as isize - k) as usize;
            let snake_start = (x, y);
            if x < n && y < m {
                x += common_prefix(&a[x..], &b[y..]);
            }
            forward[k] = x;
            if odd && (k - delta).abs() < d && forward[k] + backward[-(k - delta)] >= n {
                return Some(snake_start);
            }
        }

        for k in (-d..=d).rev().step_by(2) {
            let mut x = if k == -d || (k != d && backward[k - 1] < backward[k + 1]) {
                backward[k + 1]
            } else {
                backward[k - 1] + 1
            };
            let mut y = (x as isize - k) as usize;
            if x < n && y < m {
                let advance = common_suffix(&a[..n - x], &b[..m - y]);
                x += advance;
                y += advance;
            }
            backward[k] = x;
            if !odd && (k - delta).abs() <= d && backward[k] + forward[-(k - delta)] >= n {
                return Some((n.saturating_sub(x), m.saturating_sub(y)));
            }
        }
    }
    None
}

fn common_prefix(a: &[usize], b: &[usize]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix(a: &[usize], b: &[usize]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Reorder every run of changes so its deletions precede its insertions
fn deletions_first(lines: &mut [DiffLine]) {
    let mut start = 0;
    while start < lines.len() {
        if lines[start].tag == DiffTag::Equal {
            start += 1;
            continue;
        }
        let end = lines[start..]
            .iter()
            .position(|line| line.tag == DiffTag::Equal)
            .map_or(lines.len(), |offset| start + offset);
        lines[start..end].sort_by_key(|line| line.tag != DiffTag::Delete);
        start = end;
    }
}

/// Render a diff with `"  "`, `"+ "` and `"- "` prefixes
#[must_use]
pub fn format_diff_for_display(diff: &Diff) -> String {
    diff.format_for_display()
}

#[must_use]
pub fn has_changes(diff: &Diff) -> bool {
    diff.has_changes()
}
