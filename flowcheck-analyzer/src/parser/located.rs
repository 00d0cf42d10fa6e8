use nom_locate::LocatedSpan;

use crate::span::Pos;

pub type LocatedStr<'a> = LocatedSpan<&'a str>;

pub fn to_pos(located: &LocatedStr) -> Pos {
    Pos::new(
        located.location_line() as usize,
        located.get_utf8_column(),
    )
}
