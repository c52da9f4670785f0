// Getter/setter pairs shared by the proxy and engine views.

/// Buffered accessor pair on a proxy view: reads go through
/// `Self::read`, writes store an override through `Self::write`.
macro_rules! buffered_field {
    ($get:ident, $set:ident, $ty:ty, $field:ident, $engine_get:ident) => {
        fn $get(&self) -> ProxyResult<$ty> {
            self.read(|f| f.$field, |e, h| e.$engine_get(h), |d| d.$field)
        }

        fn $set(&mut self, value: $ty) -> ProxyResult<()> {
            self.write(|f| f.$field = Some(value))
        }
    };
}

/// Direct accessor pair on an engine view.
macro_rules! engine_field {
    ($get:ident, $set:ident, $ty:ty, $engine_get:ident, $engine_set:ident) => {
        fn $get(&self) -> ProxyResult<$ty> {
            self.engine.$engine_get(self.handle).map_err(Self::fail)
        }

        fn $set(&mut self, value: $ty) -> ProxyResult<()> {
            self.engine.$engine_set(self.handle, value).map_err(Self::fail)
        }
    };
}
