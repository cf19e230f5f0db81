//! Static Helvetica width table and greedy word-wrap for the export pages.
//!
//! Widths come from the Adobe core-14 AFM for Helvetica, in 1/1000 em. The
//! export writes Helvetica as a base-14 font, so these are the exact advances
//! the viewer will use for ASCII text. Non-ASCII characters fall back to
//! `average_char_width`.
//! Index = (char as usize) - 32.

/// Static character-width table for one font.
///
/// Width array slot layout:
/// ```text
/// [0]=sp  [1]=!   [2]="   [3]=#   [4]=$   [5]=%   [6]=&   [7]='
/// [8]=(   [9]=)   [10]=*  [11]=+  [12]=,  [13]=-  [14]=.  [15]=/
/// [16..25]=0-9
/// [26]=:  [27]=;  [28]=<  [29]==  [30]=>  [31]=?  [32]=@
/// [33..58]=A-Z
/// [59]=[  [60]=\  [61]=]  [62]=^  [63]=_  [64]=`
/// [65..90]=a-z
/// [91]={  [92]=|  [93]=}  [94]=~
/// ```
pub struct FontMetricTable {
    /// PDF base font name.
    pub base_font: &'static str,
    widths: [u16; 95],
    pub average_char_width: u16,
    pub space_width: u16,
}

impl FontMetricTable {
    /// Width of one character in 1/1000 em.
    fn char_units(&self, c: char) -> u16 {
        let code = c as usize;
        if (32..=126).contains(&code) {
            self.widths[code - 32]
        } else {
            self.average_char_width
        }
    }

    /// Rendered width of `s` in points at `size_pt`.
    pub fn measure_str(&self, s: &str, size_pt: f32) -> f32 {
        let units: u32 = s.chars().map(|c| u32::from(self.char_units(c))).sum();
        units as f32 * size_pt / 1000.0
    }

    /// Greedy word-wrap of `text` into lines no wider than `max_width` points.
    ///
    /// Hard line breaks in the source are kept. A single word wider than the
    /// line is split at character boundaries.
    pub fn wrap(&self, text: &str, max_width: f32, size_pt: f32) -> Vec<String> {
        let space_w = f32::from(self.space_width) * size_pt / 1000.0;
        let mut lines = Vec::new();

        for source_line in text.lines() {
            let mut current = String::new();
            let mut current_width = 0.0_f32;

            for word in source_line.split_whitespace() {
                for piece in self.split_overlong(word, max_width, size_pt) {
                    let piece_w = self.measure_str(&piece, size_pt);
                    if current.is_empty() {
                        current_width = piece_w;
                        current = piece;
                    } else if current_width + space_w + piece_w > max_width {
                        lines.push(std::mem::take(&mut current));
                        current_width = piece_w;
                        current = piece;
                    } else {
                        current.push(' ');
                        current.push_str(&piece);
                        current_width += space_w + piece_w;
                    }
                }
            }

            if !current.is_empty() {
                lines.push(current);
            }
        }
        lines
    }

    fn split_overlong(&self, word: &str, max_width: f32, size_pt: f32) -> Vec<String> {
        if self.measure_str(word, size_pt) <= max_width {
            return vec![word.to_string()];
        }
        let mut pieces = Vec::new();
        let mut piece = String::new();
        let mut width = 0.0_f32;
        for c in word.chars() {
            let w = f32::from(self.char_units(c)) * size_pt / 1000.0;
            if !piece.is_empty() && width + w > max_width {
                pieces.push(std::mem::take(&mut piece));
                width = 0.0;
            }
            piece.push(c);
            width += w;
        }
        if !piece.is_empty() {
            pieces.push(piece);
        }
        pieces
    }
}

pub static HELVETICA: FontMetricTable = FontMetricTable {
    base_font: "Helvetica",
    #[rustfmt::skip]
    widths: [
        // sp   !    "    #    $    %    &    '    (    )    *    +    ,    -    .    /
        278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
        // 0    1    2    3    4    5    6    7    8    9
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
        // :    ;    <    =    >    ?    @
        278, 278, 584, 584, 584, 556, 1015,
        // A    B    C    D    E    F    G    H    I    J    K    L    M
        667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
        // N    O    P    Q    R    S    T    U    V    W    X    Y    Z
        722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
        // [    \    ]    ^    _    `
        278, 278, 278, 469, 556, 333,
        // a    b    c    d    e    f    g    h    i    j    k    l    m
        556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
        // n    o    p    q    r    s    t    u    v    w    x    y    z
        556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
        // {    |    }    ~
        334, 260, 334, 584,
    ],
    average_char_width: 556,
    space_width: 278,
};
