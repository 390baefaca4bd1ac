//! Модуль для работы с аудио
//!
//! Декодирование и экспорт, операции над фрагментами в памяти,
//! библиотека фоновой музыки и сведение дорожек.

pub mod codec;
pub mod library;
pub mod mixer;
pub mod segment;
