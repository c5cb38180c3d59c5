//! Seven-segment encodings and the fixed word patterns the clock shows.

/// Number of digits on the display.
pub const CELL_COUNT: usize = 4;

// ============================================================================
// Segment constants
// ============================================================================

/// Bit assignments of a single 7-segment digit, TM1637 order.
pub struct Segments;

impl Segments {
    pub const A: u8 = 0b_0000_0001;
    pub const B: u8 = 0b_0000_0010;
    pub const C: u8 = 0b_0000_0100;
    pub const D: u8 = 0b_0000_1000;
    pub const E: u8 = 0b_0001_0000;
    pub const F: u8 = 0b_0010_0000;
    pub const G: u8 = 0b_0100_0000;
    /// Decimal point; on digit 1 this drives the colon.
    pub const DP: u8 = 0b_1000_0000;
    pub const BLANK: u8 = 0;

    /// Digits 0-9.
    pub const DIGITS: [u8; 10] = [
        0b_0011_1111, // 0
        0b_0000_0110, // 1
        0b_0101_1011, // 2
        0b_0100_1111, // 3
        0b_0110_0110, // 4
        0b_0110_1101, // 5
        0b_0111_1101, // 6
        0b_0000_0111, // 7
        0b_0111_1111, // 8
        0b_0110_1111, // 9
    ];

    /// Encoding of a decimal digit; values above 9 use their last digit.
    #[must_use]
    #[expect(
        clippy::indexing_slicing,
        clippy::integer_division_remainder_used,
        reason = "index is reduced modulo the table length"
    )]
    pub const fn digit(value: u8) -> u8 {
        Self::DIGITS[(value % 10) as usize]
    }

    /// Encoding of the letters and symbols the clock uses. Unknown characters are blank.
    #[must_use]
    pub const fn char(ch: char) -> u8 {
        const A: u8 = Segments::A;
        const B: u8 = Segments::B;
        const C: u8 = Segments::C;
        const D: u8 = Segments::D;
        const E: u8 = Segments::E;
        const F: u8 = Segments::F;
        const G: u8 = Segments::G;
        match ch {
            '0'..='9' => Self::digit((ch as u8).wrapping_sub(b'0')),
            'A' | 'a' => A | B | C | E | F | G,
            'b' => C | D | E | F | G,
            'C' => A | D | E | F,
            'd' => B | C | D | E | G,
            'E' => A | D | E | F | G,
            'F' => A | E | F | G,
            'G' | 'g' => A | B | C | D | F | G,
            'I' => B | C,
            'L' => D | E | F,
            'n' => C | E | G,
            'O' => A | B | C | D | E | F,
            'o' => C | D | E | G,
            'P' => A | B | E | F | G,
            'r' => E | G,
            'S' => A | C | D | F | G,
            't' => D | E | F | G,
            'Y' | 'y' => B | C | D | F | G,
            '-' => G,
            _ => Self::BLANK,
        }
    }
}

// ============================================================================
// Frames
// ============================================================================

/// Raw segment bytes for the four digits, left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame(pub [u8; CELL_COUNT]);

impl Frame {
    /// All segments off.
    pub const BLANK: Self = Self([Segments::BLANK; CELL_COUNT]);

    /// Encode up to four characters; missing positions are blank.
    ///
    /// ```
    /// use alarm_kit::segments::{Frame, Segments};
    ///
    /// let frame = Frame::from_text("Err");
    /// assert_eq!(frame.0[3], Segments::BLANK);
    /// ```
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut cells = [Segments::BLANK; CELL_COUNT];
        for (cell, ch) in cells.iter_mut().zip(text.chars()) {
            *cell = Segments::char(ch);
        }
        Self(cells)
    }

    /// Two zero-padded two-digit numbers, e.g. `HH:MM` or `DD.MM`.
    #[must_use]
    #[expect(
        clippy::integer_division_remainder_used,
        reason = "splits values into decimal digits"
    )]
    pub const fn from_pairs(left: u8, right: u8) -> Self {
        Self([
            Segments::digit(left / 10),
            Segments::digit(left % 10),
            Segments::digit(right / 10),
            Segments::digit(right % 10),
        ])
    }

    /// `b` followed by a right-aligned brightness level.
    #[must_use]
    #[expect(
        clippy::integer_division_remainder_used,
        reason = "splits the level into decimal digits"
    )]
    pub const fn brightness(level: u8) -> Self {
        let tens = if level >= 10 {
            Segments::digit(level / 10)
        } else {
            Segments::BLANK
        };
        Self([Segments::char('b'), Segments::BLANK, tens, Segments::digit(level % 10)])
    }

    /// Turn on the colon (decimal point of digit 1).
    #[must_use]
    pub const fn with_colon(self) -> Self {
        let [d0, d1, d2, d3] = self.0;
        Self([d0, d1 | Segments::DP, d2, d3])
    }

    /// Blank the left pair of digits.
    #[must_use]
    pub const fn without_left(self) -> Self {
        let [_, d1, d2, d3] = self.0;
        Self([Segments::BLANK, d1 & Segments::DP, d2, d3])
    }

    /// Blank the right pair of digits.
    #[must_use]
    pub const fn without_right(self) -> Self {
        let [d0, d1, _, _] = self.0;
        Self([d0, d1, Segments::BLANK, Segments::BLANK])
    }
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        Self(message.pattern())
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Words the clock can show in place of the time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Message {
    /// `COnn`: joining Wi-Fi.
    Connecting,
    /// `SYnC`: time request in flight.
    Sync,
    /// `GOOd`: time acquired.
    Good,
    /// `Err`: Wi-Fi or time failure.
    Err,
    /// `dAY`: alarm set for daytime.
    Day,
    /// `nItE`: alarm set for nighttime.
    Night,
    /// `dAtE`: the date follows.
    Date,
    /// `brIt`: brightness setting.
    Brightness,
    /// `ALAr`: alarm setting.
    Alarm,
    /// `On`: alarm enabled while editing.
    On,
    /// `OFF`: alarm disabled.
    Off,
    /// `AP`: the provisioning access point is waiting for credentials.
    AccessPoint,
}

impl Message {
    /// Segment bytes for this word.
    #[must_use]
    pub const fn pattern(self) -> [u8; CELL_COUNT] {
        const A: u8 = Segments::A;
        const B: u8 = Segments::B;
        const C: u8 = Segments::C;
        const D: u8 = Segments::D;
        const E: u8 = Segments::E;
        const F: u8 = Segments::F;
        const G: u8 = Segments::G;
        match self {
            Self::Connecting => [A | D | E | F, A | B | C | D | E | F, C | E | G, C | E | G],
            Self::Sync => [A | C | D | F | G, B | C | D | F | G, C | E | G, A | D | E | F],
            Self::Good => [
                A | B | C | D | F | G,
                A | B | C | D | E | F,
                A | B | C | D | E | F,
                B | C | D | E | G,
            ],
            Self::Err => [A | D | E | F | G, E | G, E | G, 0],
            Self::Day => [B | C | D | E | G, A | B | C | E | F | G, B | C | D | F | G, 0],
            Self::Night => [C | E | G, B | C, D | E | F | G, A | D | E | F | G],
            Self::Date => [B | C | D | E | G, A | B | C | E | F | G, D | E | F | G, A | D | E | F | G],
            Self::Brightness => [C | D | E | F | G, E | G, B | C, D | E | F | G],
            Self::Alarm => [A | B | C | E | F | G, D | E | F, A | B | C | E | F | G, E | G],
            Self::On => [A | B | C | D | E | F, C | E | G, 0, 0],
            Self::Off => [A | B | C | D | E | F, A | E | F | G, A | E | F | G, 0],
            Self::AccessPoint => [A | B | C | E | F | G, A | B | E | F | G, 0, 0],
        }
    }
}
