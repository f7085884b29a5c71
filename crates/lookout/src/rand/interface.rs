/// A trait for random sources that return random integers.
///
/// This abstraction allows you to plug in a real random source or a mocked
/// random source in tests. Each lookup worker owns its source exclusively, so
/// `rand` takes `&mut self` and implementations need no interior
/// synchronization.
///
/// The random type `T` is generic (typically `u64`).
///
/// # Example
/// ```
/// use lookout::RandSource;
///
/// struct Counter(u64);
/// impl RandSource<u64> for Counter {
///     fn rand(&mut self) -> u64 {
///         self.0 += 1;
///         self.0
///     }
/// }
///
/// let mut rng = Counter(0);
/// assert_eq!(rng.rand(), 1);
/// assert_eq!(rng.rand(), 2);
/// ```
pub trait RandSource<T> {
    /// Returns a random integer.
    fn rand(&mut self) -> T;
}

impl<T, R> RandSource<T> for &mut R
where
    R: RandSource<T> + ?Sized,
{
    fn rand(&mut self) -> T {
        (**self).rand()
    }
}
