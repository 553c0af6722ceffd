//! Simple zero-overhead unit of measure types
//!
//! Workout steps carry durations and distances in several units at once: FIT
//! stores milliseconds and centimeters, workout plans say "90s" or "1.5km",
//! and previews print minutes or kilometers. Keeping each in its own newtype
//! makes the conversions explicit at every boundary.

use std::fmt::{Display, Formatter};
use std::ops::{Add, AddAssign, Div};

use approx::{AbsDiffEq, RelativeEq, relative_eq};
use num_traits::{Float, Num, NumCast};

pub trait IntoDimBase {
    type DimBase;

    fn into_dim_base(self) -> Self::DimBase;
}

pub trait FromUnit<U> {
    fn from_unit(u: U) -> Self;
}

pub trait IntoUnit<U> {
    fn into_unit(self) -> U;
}

pub trait CastUnitFrom<U>
where
    Self: Sized,
{
    fn cast_from(value: U) -> Option<Self>;
}

pub trait CastUnitInto<U> {
    fn cast_into(self) -> Option<U>;
}

macro_rules! unit_of_measure {
    ($u:ident) => {
        #[derive(Clone, Copy, Default, PartialEq, PartialOrd, Debug)]
        pub struct $u<N: Num>(pub N);

        impl<N> Add for $u<N>
        where
            N: Num + Add,
        {
            type Output = Self;

            fn add(self, rhs: Self) -> Self {
                Self(self.0 + rhs.0)
            }
        }

        impl<N> AddAssign for $u<N>
        where
            N: Num + AddAssign,
        {
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }

        impl<N> Div<N> for $u<N>
        where
            N: Num + Div,
        {
            type Output = Self;

            fn div(self, rhs: N) -> Self {
                Self(self.0 / rhs)
            }
        }

        impl<M, N> CastUnitFrom<$u<M>> for $u<N>
        where
            N: Num + NumCast,
            M: Num + NumCast,
            Self: Sized,
        {
            fn cast_from(value: $u<M>) -> Option<Self> {
                NumCast::from(value.0).map(Self)
            }
        }

        impl<N> AbsDiffEq for $u<N>
        where
            N: Num + Float + AbsDiffEq<N, Epsilon = N>,
        {
            type Epsilon = N;

            fn default_epsilon() -> Self::Epsilon {
                N::epsilon()
            }

            fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
                self.0.abs_diff_eq(&other.0, epsilon)
            }
        }

        impl<N> RelativeEq for $u<N>
        where
            N: Num + Float + AbsDiffEq<N, Epsilon = N> + RelativeEq<N>,
        {
            fn default_max_relative() -> Self::Epsilon {
                N::epsilon()
            }

            fn relative_eq(
                &self,
                other: &Self,
                epsilon: Self::Epsilon,
                max_relative: Self::Epsilon,
            ) -> bool {
                relative_eq!(
                    self.0,
                    other.0,
                    epsilon = epsilon,
                    max_relative = max_relative
                )
            }
        }
    };

    ($u:ident, $base:ident * $coeff:tt) => {
        unit_of_measure!($u);
        unit_conversion!($u, $coeff, $base);
    };

    ($u:ident, $base:ident / $coeff:tt) => {
        unit_of_measure!($u);
        unit_conversion!($u, 1.0 / ($coeff as f64), $base);
    };
}

macro_rules! unit_conversion {
    ($u:ident, $coeff:expr, $base:ident) => {
        impl<N> FromUnit<$u<N>> for $base<f64>
        where
            N: Num,
            f64: From<N>,
        {
            fn from_unit(value: $u<N>) -> Self {
                Self(<f64 as From<N>>::from(value.0) * ($coeff as f64))
            }
        }

        impl<N> FromUnit<$base<N>> for $u<f64>
        where
            N: Num,
            f64: From<N>,
        {
            fn from_unit(value: $base<N>) -> Self {
                Self(<f64 as From<N>>::from(value.0) / ($coeff as f64))
            }
        }

        impl<N> IntoDimBase for $u<N>
        where
            N: Num,
            f64: From<N>,
        {
            type DimBase = $base<f64>;

            fn into_dim_base(self) -> Self::DimBase {
                Self::DimBase::from_unit(self)
            }
        }
    };
}

impl<U, V> FromUnit<V> for U
where
    U: FromUnit<V::DimBase>,
    V: IntoDimBase,
{
    fn from_unit(v: V) -> Self {
        U::from_unit(v.into_dim_base())
    }
}

impl<U, V> IntoUnit<U> for V
where
    U: FromUnit<V>,
{
    fn into_unit(self) -> U {
        U::from_unit(self)
    }
}

impl<U, V> CastUnitInto<U> for V
where
    U: CastUnitFrom<V>,
{
    fn cast_into(self) -> Option<U> {
        U::cast_from(self)
    }
}

// Time units:
unit_of_measure![Seconds];
unit_of_measure![Milliseconds, Seconds / 1000];
unit_of_measure![Minutes, Seconds * 60];
unit_of_measure![Hours, Seconds * 3600];

// Distance units:
unit_of_measure![Meters];
unit_of_measure![Centimeters, Meters / 100];
unit_of_measure![Kilometers, Meters * 1000];
unit_of_measure![Miles, Meters * 1609.344];
unit_of_measure![Yards, Meters * 0.9144];

impl<T> Display for Meters<T>
where
    T: Num + Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}m", self.0)
    }
}

impl<T> Display for Seconds<T>
where
    T: Num + Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.0)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn unit_addition() {
        let a = Seconds(30);
        let b = Seconds(45);
        assert_eq!(a + b, Seconds(75));
    }

    #[test]
    fn from_unit_conversions() {
        assert_eq!(Seconds::from_unit(Minutes(2.0)), Seconds(120.0));
        assert_eq!(Seconds::from_unit(Hours(1.0)), Seconds(3600.0));
        assert_eq!(Minutes::from_unit(Hours(2.0)), Minutes(120.0));
    }

    #[test]
    fn fit_storage_units() {
        assert_eq!(Seconds::from_unit(Milliseconds(90000)), Seconds(90.0));
        assert_eq!(Milliseconds::from_unit(Seconds(1.5)), Milliseconds(1500.0));
        assert_eq!(Centimeters::from_unit(Meters(2.5)), Centimeters(250.0));
        assert_eq!(Meters::from_unit(Centimeters(40000)), Meters(400.0));
    }

    #[test]
    fn imperial_distances() {
        let m: Meters<f64> = Miles(1.0).into_unit();
        assert_relative_eq!(m, Meters(1609.344));
        let cm: Centimeters<f64> = Yards(100.0).into_unit();
        assert_relative_eq!(cm, Centimeters(9144.0), epsilon = 1e-9);
    }

    #[test]
    fn cast_into() {
        let ms: Option<Milliseconds<u32>> = Milliseconds(90000.0).cast_into();
        assert_eq!(ms, Some(Milliseconds(90000)));

        let overflow: Option<Milliseconds<u32>> = Milliseconds(5.0e9).cast_into();
        assert_eq!(overflow, None);

        let negative: Option<Centimeters<u32>> = Centimeters(-1.0).cast_into();
        assert_eq!(negative, None);
    }

    #[test]
    fn display() {
        assert_eq!(Meters(400).to_string(), "400m");
        assert_eq!(Seconds(30).to_string(), "30s");
    }
}
