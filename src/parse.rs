//! Inspection of parsed cron expressions.
//!
//! Parsing happens in two stages: the combinators in this module turn each
//! whitespace-separated field of an expression into a typed expression tree,
//! and [`Cron::new`](crate::Cron::new) reduces that tree into the compiled
//! bitmap form used by the occurrence search. The tree is public so an
//! expression can be examined without reducing it.
//!
//! One grammar covers the list-shaped part of every field: a bare `*`, or
//! comma-separated elements where each element is a value, a `a-b` range, or
//! a `/step` stride over either. The day fields dispatch on their leading
//! character first so the `?`/`L`/`W`/`#` extensions, which never appear
//! inside lists, stay out of the shared grammar.

use core::fmt::{self, Display, Formatter};
use core::iter::{Chain, Once};
use core::marker::PhantomData;
use core::slice;
use core::str::FromStr;
use std::vec;

use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char, digit1},
    combinator::{all_consuming, cut, map, map_res, opt},
    multi::separated_list1,
    sequence::{preceded, terminated},
    IResult,
};
use thiserror::Error;

use crate::internal::Sealed;

/// The two accepted field layouts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Format {
    /// `minute hour day-of-month month day-of-week`; seconds default to `0`.
    #[default]
    Standard,
    /// `second minute hour day-of-month month day-of-week`.
    IncludeSeconds,
}

/// Names the field a [`ParseError`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// The optional leading seconds field.
    Seconds,
    /// The minutes field.
    Minutes,
    /// The hours field.
    Hours,
    /// The day-of-month field.
    DayOfMonth,
    /// The month field.
    Month,
    /// The day-of-week field.
    DayOfWeek,
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            Field::Seconds => "seconds",
            Field::Minutes => "minutes",
            Field::Hours => "hours",
            Field::DayOfMonth => "day of month",
            Field::Month => "month",
            Field::DayOfWeek => "day of week",
        })
    }
}

/// An error describing why a cron expression failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The input contained no fields at all.
    #[error("cron expression is empty")]
    Empty,
    /// The input had the wrong number of whitespace-separated fields for the
    /// requested [`Format`].
    #[error("expected {expected} whitespace-separated fields, found {found}")]
    FieldCount {
        /// Fields the format calls for.
        expected: usize,
        /// Fields actually present.
        found: usize,
    },
    /// An `@`-prefixed input did not name a known macro.
    #[error("unknown macro: @{0}")]
    UnknownMacro(String),
    /// The day fields carry extensions that cannot combine: a `W` day of
    /// the month together with a last (`L`) or nth (`#`) day of the week.
    #[error("conflicting day fields: {dom:?} and {dow:?}")]
    ConflictingDayFields {
        /// The day-of-month field as written.
        dom: String,
        /// The day-of-week field as written.
        dow: String,
    },
    /// A field contained an out-of-range value, a malformed range or step, a
    /// misplaced extension, or trailing garbage.
    #[error("invalid {field} field: {value:?}")]
    InvalidField {
        /// The offending field.
        field: Field,
        /// The field text as written.
        value: String,
    },
}

/// An error returned when a typed expression value is out of range.
#[derive(Debug)]
pub struct ValueOutOfRangeError;

impl Display for ValueOutOfRangeError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        "the expression value is out of range of valid values".fmt(f)
    }
}

impl std::error::Error for ValueOutOfRangeError {}

/// A trait implemented for expression values that defines a MIN and MAX value.
pub trait ExprValue: Sized + Sealed {
    /// The max value for an expression value.
    const MAX: u8;
    /// The min value for an expression value.
    const MIN: u8;

    /// The max value as this expression value type.
    fn max() -> Self;
    /// The min value as this expression value type.
    fn min() -> Self;
}

macro_rules! expr_value {
    ($(#[$doc:meta])* $name:ident, $min:literal ..= $max:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
        pub struct $name(pub(crate) u8);

        impl Sealed for $name {}

        impl ExprValue for $name {
            const MAX: u8 = $max;
            const MIN: u8 = $min;

            fn max() -> Self {
                Self(Self::MAX)
            }
            fn min() -> Self {
                Self(Self::MIN)
            }
        }

        impl From<$name> for u8 {
            /// Returns the value as written.
            #[inline]
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl TryFrom<u8> for $name {
            type Error = ValueOutOfRangeError;

            #[inline]
            fn try_from(value: u8) -> Result<Self, Self::Error> {
                if value >= Self::MIN && value <= Self::MAX {
                    Ok(Self(value))
                } else {
                    Err(ValueOutOfRangeError)
                }
            }
        }

        impl PartialEq<u8> for $name {
            #[inline]
            fn eq(&self, other: &u8) -> bool {
                &self.0 == other
            }
        }
    };
}

expr_value! {
    /// A second value, 0-59.
    Second, 0..=59
}

expr_value! {
    /// A minute value, 0-59.
    Minute, 0..=59
}

expr_value! {
    /// An hour value, 0-23.
    Hour, 0..=23
}

expr_value! {
    /// A day of the month, 1-31.
    DayOfMonth, 1..=31
}

expr_value! {
    /// A last-day-of-month offset, 1-30.
    DayOfMonthOffset, 1..=30
}

expr_value! {
    /// A month, 1-12.
    Month, 1..=12
}

expr_value! {
    /// A day of the week, 0-7; both 0 and 7 mean Sunday.
    DayOfWeek, 0..=7
}

expr_value! {
    /// An "nth" day, 1-5.
    NthDay, 1..=5
}

/// A step value constrained by an expression value. The max value of this
/// type differs depending on the type `E`; the minimum is always 1.
///
/// | Type           | Max |
/// | -------------- | --- |
/// | [`Second`]     | 59  |
/// | [`Minute`]     | 59  |
/// | [`Hour`]       | 23  |
/// | [`DayOfMonth`] | 30  |
/// | [`Month`]      | 11  |
/// | [`DayOfWeek`]  | 7   |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Step<E> {
    e: PhantomData<fn(E) -> E>,
    value: u8,
}

impl<E: Sealed> Sealed for Step<E> {}

impl<E: ExprValue> ExprValue for Step<E> {
    const MAX: u8 = E::MAX - E::MIN;
    const MIN: u8 = 1;

    fn max() -> Self {
        Self {
            e: PhantomData,
            value: Self::MAX,
        }
    }
    fn min() -> Self {
        Self {
            e: PhantomData,
            value: Self::MIN,
        }
    }
}

impl<E> From<Step<E>> for u8 {
    #[inline]
    fn from(step: Step<E>) -> Self {
        step.value
    }
}

impl<E: ExprValue> TryFrom<u8> for Step<E> {
    type Error = ValueOutOfRangeError;

    #[inline]
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value >= Self::MIN && value <= Self::MAX {
            Ok(Self {
                e: PhantomData,
                value,
            })
        } else {
            Err(ValueOutOfRangeError)
        }
    }
}

/// A day of the week expression.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DayOfWeekExpr {
    /// A `*` (or `?`) character.
    All,
    /// An `L` suffix: the last such weekday of the month.
    Last(DayOfWeek),
    /// A `#` suffix: the n-th such weekday of the month.
    Nth(DayOfWeek, NthDay),
    /// Possibly multiple values, ranges, or steps.
    Many(Exprs<DayOfWeek>),
}

/// A "last" expression for [`DayOfMonthExpr`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Last {
    /// An `L` expression: the last day of the month.
    Day,
    /// An `LW` expression: the weekday closest to the last day of the month.
    Weekday,
    /// The last day of the month offset backwards, e.g. `L-3`.
    Offset(DayOfMonthOffset),
    /// The weekday closest to the offset last day, e.g. `L-3W`.
    OffsetWeekday(DayOfMonthOffset),
}

/// A day of the month expression.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DayOfMonthExpr {
    /// A `*` (or `?`) character.
    All,
    /// An expression containing an `L` character.
    Last(Last),
    /// A `W` expression: the weekday closest to the given day of the month.
    ClosestWeekday(DayOfMonth),
    /// Possibly multiple values, ranges, or steps.
    Many(Exprs<DayOfMonth>),
}

/// A generic expression that can take a `*` or many exprs.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Expr<E> {
    /// A `*` character.
    All,
    /// Possibly multiple values, ranges, or steps.
    Many(Exprs<E>),
}

/// Either one value, a range, or a step expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OrsExpr<E> {
    /// One value.
    One(E),
    /// A `-` range.
    Range(E, E),
    /// A `/` step.
    Step {
        /// The start value. If written as `*`, the min value of `E`.
        start: E,
        /// The end value. If the step has no explicit end, the max value of `E`.
        end: E,
        /// The step value.
        step: Step<E>,
    },
}

impl<E: Copy + ExprValue + PartialEq> OrsExpr<E> {
    /// Normalizes the expression, simplifying it.
    ///
    /// * A range or step with equal endpoints (`1-1`, `1-1/3`) becomes one
    ///   value.
    /// * A step of one (`5/1`, `5-30/1`) becomes a range.
    pub fn normalize(self) -> OrsExpr<E> {
        match self {
            OrsExpr::Range(a, b)
            | OrsExpr::Step {
                start: a, end: b, ..
            } if a == b => OrsExpr::One(a),
            OrsExpr::Step { step, start, end } if u8::from(step) == 1 => OrsExpr::Range(start, end),
            x => x,
        }
    }
}

/// A set of expressions with at least one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exprs<E> {
    /// The first expression.
    pub first: OrsExpr<E>,
    /// The rest of the expressions in the set.
    pub tail: Vec<OrsExpr<E>>,
}

/// An immutable iterator over all expressions in a set of [`Exprs`].
pub type ExprsIter<'a, E> = Chain<Once<&'a OrsExpr<E>>, slice::Iter<'a, OrsExpr<E>>>;

/// An owned iterator over all expressions in a set of [`Exprs`].
pub type IntoExprsIter<E> = Chain<Once<OrsExpr<E>>, vec::IntoIter<OrsExpr<E>>>;

impl<E> Exprs<E> {
    /// Creates a new set of [`Exprs`] from the first [`OrsExpr`].
    pub fn new(first: OrsExpr<E>) -> Self {
        Self {
            first,
            tail: Vec::new(),
        }
    }

    /// Iterates over all expressions in this set.
    pub fn iter(&self) -> ExprsIter<E> {
        core::iter::once(&self.first).chain(self.tail.iter())
    }
}

impl<E> IntoIterator for Exprs<E> {
    type Item = OrsExpr<E>;
    type IntoIter = IntoExprsIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        core::iter::once(self.first).chain(self.tail)
    }
}

impl<'a, E> IntoIterator for &'a Exprs<E> {
    type Item = &'a OrsExpr<E>;
    type IntoIter = ExprsIter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A parsed cron expression. This can be inspected or reduced into a
/// [`Cron`](crate::Cron) value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct CronExpr {
    /// The seconds part of the expression; `{0}` in the standard format.
    pub seconds: Expr<Second>,
    /// The minute part of the expression.
    pub minutes: Expr<Minute>,
    /// The hour part of the expression.
    pub hours: Expr<Hour>,
    /// The day of the month part of the expression.
    pub doms: DayOfMonthExpr,
    /// The month part of the expression.
    pub months: Expr<Month>,
    /// The day of the week part of the expression.
    pub dows: DayOfWeekExpr,
}

impl CronExpr {
    /// Parses a cron expression in the given field format.
    ///
    /// Macros (`@daily` and friends) are handled by
    /// [`Cron::parse`](crate::Cron::parse); they expand directly to compiled
    /// values and have no tree form.
    pub fn parse(input: &str, format: Format) -> Result<Self, ParseError> {
        let fields: Vec<&str> = input.split_whitespace().collect();
        if fields.is_empty() {
            return Err(ParseError::Empty);
        }
        let expected = match format {
            Format::Standard => 5,
            Format::IncludeSeconds => 6,
        };
        if fields.len() != expected {
            return Err(ParseError::FieldCount {
                expected,
                found: fields.len(),
            });
        }

        let (seconds, rest) = match format {
            Format::Standard => (Expr::Many(Exprs::new(OrsExpr::One(Second(0)))), &fields[..]),
            Format::IncludeSeconds => (
                parse_field(Field::Seconds, fields[0], second_field)?,
                &fields[1..],
            ),
        };

        let doms = parse_field(Field::DayOfMonth, rest[2], dom_field)?;
        let dows = parse_field(Field::DayOfWeek, rest[4], dow_field)?;

        // a W day moves along the calendar; pinning it to a last/nth weekday
        // at the same time cannot be satisfied
        let dom_moves = matches!(
            doms,
            DayOfMonthExpr::ClosestWeekday(_)
                | DayOfMonthExpr::Last(Last::Weekday)
                | DayOfMonthExpr::Last(Last::OffsetWeekday(_))
        );
        if dom_moves && matches!(dows, DayOfWeekExpr::Last(_) | DayOfWeekExpr::Nth(..)) {
            return Err(ParseError::ConflictingDayFields {
                dom: rest[2].to_string(),
                dow: rest[4].to_string(),
            });
        }

        Ok(CronExpr {
            seconds,
            minutes: parse_field(Field::Minutes, rest[0], minute_field)?,
            hours: parse_field(Field::Hours, rest[1], hour_field)?,
            doms,
            months: parse_field(Field::Month, rest[3], month_field)?,
            dows,
        })
    }
}

impl FromStr for CronExpr {
    type Err = ParseError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, Format::Standard)
    }
}

/// Runs a field parser over one whitespace-separated field, converting any
/// failure (including trailing garbage) into an error naming the field.
fn parse_field<'a, O>(
    field: Field,
    input: &'a str,
    parser: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> Result<O, ParseError> {
    match all_consuming(parser)(input) {
        Ok((_, value)) => Ok(value),
        Err(_) => Err(ParseError::InvalidField {
            field,
            value: input.to_string(),
        }),
    }
}

/// Parses a decimal number into any value type with a `TryFrom<u8>` range.
fn number<E>() -> impl Fn(&str) -> IResult<&str, E>
where
    E: TryFrom<u8, Error = ValueOutOfRangeError>,
{
    |input| {
        map_res(digit1, |digits: &str| {
            digits
                .parse::<u8>()
                .map_err(|_| ValueOutOfRangeError)
                .and_then(E::try_from)
        })(input)
    }
}

/// One element of a field list: `a`, `a-b`, `*`, or any of those with a
/// `/step` stride. A `*` covers the whole field; a stride without an explicit
/// end runs to the top of the field. Once a `-` or `/` is consumed the rest
/// of the element must follow, so malformed tails fail the whole field
/// instead of being left over.
fn element<E, F>(value: F) -> impl Fn(&str) -> IResult<&str, OrsExpr<E>>
where
    E: ExprValue + Copy,
    F: Fn(&str) -> IResult<&str, E>,
{
    move |input: &str| {
        let (input, star) = opt(char('*'))(input)?;
        let (input, bounds) = if star.is_some() {
            (input, None)
        } else {
            let (input, start) = value(input)?;
            let (input, end) = opt(preceded(char('-'), cut(&value)))(input)?;
            (input, Some((start, end)))
        };
        let (input, step) = opt(preceded(char('/'), cut(number::<Step<E>>())))(input)?;

        let element = match (bounds, step) {
            (None, Some(step)) => OrsExpr::Step {
                start: E::min(),
                end: E::max(),
                step,
            },
            // a bare `*` inside a list still covers the whole field
            (None, None) => OrsExpr::Range(E::min(), E::max()),
            (Some((start, None)), None) => OrsExpr::One(start),
            // an open stride like `30/5` runs to the top of the field
            (Some((start, None)), Some(step)) => OrsExpr::Step {
                start,
                end: E::max(),
                step,
            },
            (Some((start, Some(end))), None) => OrsExpr::Range(start, end),
            (Some((start, Some(end))), Some(step)) => OrsExpr::Step { start, end, step },
        };
        Ok((input, element))
    }
}

/// The grammar shared by every field: a bare `*`, or a comma-separated list
/// of elements. The day fields layer their extensions on top of this.
fn field<E, F>(value: F) -> impl Fn(&str) -> IResult<&str, Expr<E>>
where
    E: ExprValue + Copy,
    F: Fn(&str) -> IResult<&str, E>,
{
    move |input: &str| {
        // a bare `*` is the whole field; `*/step` is an element list. Only
        // the first star short-circuits, so `*,...` leaves its tail for the
        // field-level all_consuming to reject.
        let (rest, star) = opt(char('*'))(input)?;
        if star.is_some() && !rest.starts_with('/') {
            return Ok((rest, Expr::All));
        }
        let (rest, list) = separated_list1(char(','), cut(element(&value)))(input)?;
        Ok((rest, Expr::Many(into_exprs(list))))
    }
}

fn into_exprs<E>(list: Vec<OrsExpr<E>>) -> Exprs<E> {
    let mut items = list.into_iter();
    let first = items.next().expect("separated_list1 yields at least one element");
    Exprs {
        first,
        tail: items.collect(),
    }
}

const MONTH_NAMES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const DAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Matches one of the given three-letter names, case-insensitively, yielding
/// its index.
fn name_value<'a>(input: &'a str, names: &[&str]) -> IResult<&'a str, u8> {
    for (index, name) in names.iter().enumerate() {
        let matched: IResult<&str, &str> = tag_no_case(*name)(input);
        if let Ok((rest, _)) = matched {
            return Ok((rest, index as u8));
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Tag,
    )))
}

fn month_value(input: &str) -> IResult<&str, Month> {
    if let Ok(parsed) = number::<Month>()(input) {
        return Ok(parsed);
    }
    let (rest, index) = name_value(input, &MONTH_NAMES)?;
    Ok((rest, Month(index + 1)))
}

fn dow_value(input: &str) -> IResult<&str, DayOfWeek> {
    if let Ok(parsed) = number::<DayOfWeek>()(input) {
        return Ok(parsed);
    }
    let (rest, index) = name_value(input, &DAY_NAMES)?;
    Ok((rest, DayOfWeek(index)))
}

#[inline]
fn second_field(s: &str) -> IResult<&str, Expr<Second>> {
    field(number())(s)
}

#[inline]
fn minute_field(s: &str) -> IResult<&str, Expr<Minute>> {
    field(number())(s)
}

#[inline]
fn hour_field(s: &str) -> IResult<&str, Expr<Hour>> {
    field(number())(s)
}

#[inline]
fn month_field(s: &str) -> IResult<&str, Expr<Month>> {
    field(month_value)(s)
}

fn dom_field(input: &str) -> IResult<&str, DayOfMonthExpr> {
    match input.as_bytes().first() {
        // `?` is a synonym for `*` in the day fields
        Some(b'?') => map(char('?'), |_| DayOfMonthExpr::All)(input),
        Some(b'L') => last_dom(input),
        _ => {
            // a lone `dW` day binds tighter than the element grammar
            if let Ok((rest, day)) = terminated(number::<DayOfMonth>(), char('W'))(input) {
                return Ok((rest, DayOfMonthExpr::ClosestWeekday(day)));
            }
            let (input, expr) = field(number::<DayOfMonth>())(input)?;
            Ok((
                input,
                match expr {
                    Expr::All => DayOfMonthExpr::All,
                    Expr::Many(exprs) => DayOfMonthExpr::Many(exprs),
                },
            ))
        }
    }
}

/// The `L` family of the day-of-month field: `L`, `LW`, `L-n`, and `L-nW`.
fn last_dom(input: &str) -> IResult<&str, DayOfMonthExpr> {
    let (input, _) = char('L')(input)?;
    let (input, offset) = opt(preceded(char('-'), cut(number::<DayOfMonthOffset>())))(input)?;
    let (input, weekday) = opt(char('W'))(input)?;
    let last = match (offset, weekday.is_some()) {
        (None, false) => Last::Day,
        (None, true) => Last::Weekday,
        (Some(offset), false) => Last::Offset(offset),
        (Some(offset), true) => Last::OffsetWeekday(offset),
    };
    Ok((input, DayOfMonthExpr::Last(last)))
}

fn dow_field(input: &str) -> IResult<&str, DayOfWeekExpr> {
    match input.as_bytes().first() {
        // `?` is a synonym for `*` in the day fields
        Some(b'?') => map(char('?'), |_| DayOfWeekExpr::All)(input),
        // Quartz compatibility: a bare `L` in this field means Saturday
        Some(b'L') => map(char('L'), |_| {
            DayOfWeekExpr::Many(Exprs::new(OrsExpr::One(DayOfWeek(6))))
        })(input),
        _ => {
            // a single day with an `L` or `#` marker binds tighter than the
            // element grammar
            if let Ok((rest, day)) = dow_value(input) {
                let (rest, marker) = opt(alt((char('L'), char('#'))))(rest)?;
                match marker {
                    Some('L') => return Ok((rest, DayOfWeekExpr::Last(day))),
                    Some(_) => {
                        return map(cut(number::<NthDay>()), move |nth| {
                            DayOfWeekExpr::Nth(day, nth)
                        })(rest)
                    }
                    None => {}
                }
            }
            let (input, expr) = field(dow_value)(input)?;
            Ok((
                input,
                match expr {
                    Expr::All => DayOfWeekExpr::All,
                    Expr::Many(exprs) => DayOfWeekExpr::Many(exprs),
                },
            ))
        }
    }
}
