//! Boilerplate reduction for operator implementations on transparent i64 newtypes.

#[macro_export]
macro_rules! op {
    (binary $ty:ty, $trait:ident, $method:ident) => {
        impl $trait for $ty {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self::Output {
                Self::from($trait::$method(self.value(), rhs.value()))
            }
        }
    };
    (inplace $ty:ty, $trait:ident, $method:ident) => {
        impl $trait for $ty {
            fn $method(&mut self, rhs: Self) {
                let mut value = self.value();
                $trait::$method(&mut value, rhs.value());
                *self = Self::from(value);
            }
        }
    };
    (unary $ty:ty, $trait:ident, $method:ident) => {
        impl $trait for $ty {
            type Output = Self;

            fn $method(self) -> Self::Output {
                Self::from($trait::$method(self.value()))
            }
        }
    };
}
