pub fn cast_to_raw_buffer<'a, T>(slice: &[T]) -> &'a [u8] {
    let type_size = std::mem::size_of::<T>();
    let buffer = slice.as_ptr() as *const u8;
    let size = type_size * slice.len();
    unsafe { std::slice::from_raw_parts(buffer, size) }
}

pub fn cast_any_as_u8_slice<T: Sized>(value: &T) -> &[u8] {
    unsafe {
        ::core::slice::from_raw_parts(
            (value as *const T) as *const u8,
            ::core::mem::size_of::<T>(),
        )
    }
}
