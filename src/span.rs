/// A byte-offset region of one source file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub file_id: u16,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(file_id: u16, start: u32, end: u32) -> Self {
        Self {
            file_id,
            start,
            end,
        }
    }

    pub fn dummy() -> Self {
        Self::new(0, 0, 0)
    }

    /// Smallest span covering both. Both spans must point into the same
    /// file.
    pub fn merge(self, other: Span) -> Span {
        debug_assert_eq!(self.file_id, other.file_id);
        Span {
            file_id: self.file_id,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Whether `other` lies entirely within this span.
    pub fn contains(self, other: Span) -> bool {
        self.file_id == other.file_id && self.start <= other.start && other.end <= self.end
    }

    /// The byte range in the shape the diagnostic renderer consumes.
    pub fn range(self) -> std::ops::Range<usize> {
        self.start as usize..self.end as usize
    }

    pub fn len(self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(self) -> bool {
        self.start >= self.end
    }
}

/// A value annotated with its source span.
#[derive(Clone, Debug)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }

    pub fn dummy(node: T) -> Self {
        Self::new(node, Span::dummy())
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            node: f(self.node),
            span: self.span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge() {
        let a = Span::new(0, 10, 20);
        let b = Span::new(0, 15, 40);
        let m = a.merge(b);
        assert_eq!(m.start, 10);
        assert_eq!(m.end, 40);
    }

    #[test]
    fn test_contains() {
        let outer = Span::new(0, 10, 40);
        assert!(outer.contains(Span::new(0, 15, 20)));
        assert!(!outer.contains(Span::new(0, 5, 20)));
        assert!(!outer.contains(Span::new(1, 15, 20)));
    }

    #[test]
    fn test_range_and_len() {
        let span = Span::new(2, 10, 14);
        assert_eq!(span.range(), 10..14);
        assert_eq!(span.len(), 4);
        assert!(!span.is_empty());
        assert!(Span::dummy().is_empty());
    }
}
