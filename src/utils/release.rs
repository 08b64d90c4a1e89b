/// Runs `func` when dropped, including during unwinding.
pub struct DropRelease<T: FnMut()> {
    func: T,
}

impl<T: FnMut()> Drop for DropRelease<T> {
    fn drop(&mut self) {
        (self.func)();
    }
}

impl<T: FnMut()> DropRelease<T> {
    pub fn new(func: T) -> Self {
        DropRelease { func }
    }
}
