use tokio::sync::watch;

/// Receiving side of an [`Observable`].
pub type Subscription<T> = watch::Receiver<T>;

/// A single authoritative value with synchronous reads and push subscriptions.
///
/// The per-frame loop reads it with [`Observable::get`]; UI code holds a
/// [`watch::Receiver`] from [`Observable::subscribe`]. There is never a second
/// copy of the value to keep in sync.
#[derive(Debug)]
pub struct Observable<T> {
    tx: watch::Sender<T>,
}

impl<T> Observable<T> {
    pub fn new(value: T) -> Self {
        let (tx, _rx) = watch::channel(value);
        Self { tx }
    }

    /// Replaces the value and notifies subscribers if it changed.
    pub fn set(&self, value: T)
    where
        T: PartialEq,
    {
        self.tx.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    pub fn subscribe(&self) -> Subscription<T> {
        self.tx.subscribe()
    }
}

impl<T: Copy> Observable<T> {
    pub fn get(&self) -> T {
        *self.tx.borrow()
    }
}

impl<T: Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
