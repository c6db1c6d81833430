//! Type definitions, as used by CAST, CONVERT and catalog documents.

use super::Parser;
use crate::error::Result;
use crate::lexer::{Keyword, TokenKind};
use crate::types::{DataType, DEFAULT_DECIMAL_PRECISION, DEFAULT_VARYING_LENGTH, MAX_DECIMAL_PRECISION};

impl Parser<'_> {
    /// Parses a data type, optionally followed by `ARRAY [ [n] ]`.
    ///
    /// # Errors
    ///
    /// Returns a syntax error for unknown type names or malformed lengths.
    pub fn read_type_definition(&mut self) -> Result<DataType> {
        let Some(keyword) = self.current().as_keyword() else {
            return Err(self.unexpected("data type"));
        };
        let data_type = match keyword {
            Keyword::Boolean => self.simple_type(DataType::Boolean),
            Keyword::Tinyint => self.simple_type(DataType::TinyInt),
            Keyword::Smallint => self.simple_type(DataType::SmallInt),
            Keyword::Int | Keyword::Integer => self.simple_type(DataType::Integer),
            Keyword::Bigint => self.simple_type(DataType::BigInt),
            Keyword::Real => self.simple_type(DataType::Double),
            Keyword::Float => {
                self.advance();
                self.read_optional_length()?;
                DataType::Double
            }
            Keyword::Double => {
                self.advance();
                self.consume_keyword(Keyword::Precision);
                DataType::Double
            }
            Keyword::Dec | Keyword::Decimal | Keyword::Numeric => {
                self.advance();
                self.read_precision_scale()?
            }
            Keyword::Char | Keyword::Character => {
                self.advance();
                if self.consume_keyword(Keyword::Varying) {
                    DataType::Varchar(self.read_optional_length()?.unwrap_or(DEFAULT_VARYING_LENGTH))
                } else {
                    DataType::Char(self.read_optional_length()?.unwrap_or(1))
                }
            }
            Keyword::Varchar => {
                self.advance();
                DataType::Varchar(self.read_optional_length()?.unwrap_or(DEFAULT_VARYING_LENGTH))
            }
            Keyword::Clob => {
                self.advance();
                self.read_optional_length()?;
                DataType::Clob
            }
            Keyword::Binary => {
                self.advance();
                if self.consume_keyword(Keyword::Varying) {
                    DataType::Varbinary(
                        self.read_optional_length()?.unwrap_or(DEFAULT_VARYING_LENGTH),
                    )
                } else {
                    DataType::Binary(self.read_optional_length()?.unwrap_or(1))
                }
            }
            Keyword::Varbinary => {
                self.advance();
                DataType::Varbinary(self.read_optional_length()?.unwrap_or(DEFAULT_VARYING_LENGTH))
            }
            Keyword::Blob => {
                self.advance();
                self.read_optional_length()?;
                DataType::Blob
            }
            Keyword::Date => self.simple_type(DataType::Date),
            Keyword::Time => self.simple_type(DataType::Time),
            Keyword::Timestamp => self.simple_type(DataType::Timestamp),
            _ => return Err(self.unexpected("data type")),
        };

        if self.consume_keyword(Keyword::Array) {
            if self.consume(&TokenKind::LeftBracket) {
                self.read_length()?;
                self.expect(&TokenKind::RightBracket)?;
            }
            return Ok(DataType::Array(Box::new(data_type)));
        }
        Ok(data_type)
    }

    fn simple_type(&mut self, data_type: DataType) -> DataType {
        self.advance();
        data_type
    }

    /// Parses an unsigned length that fits the type system.
    fn read_length(&mut self) -> Result<u32> {
        match self.current().kind {
            TokenKind::Integer(n) if n > 0 => match u32::try_from(n) {
                Ok(length) => {
                    self.advance();
                    Ok(length)
                }
                Err(_) => Err(self.unexpected("length")),
            },
            _ => Err(self.unexpected("length")),
        }
    }

    fn read_optional_length(&mut self) -> Result<Option<u32>> {
        if !self.consume(&TokenKind::LeftParen) {
            return Ok(None);
        }
        let length = self.read_length()?;
        self.expect(&TokenKind::RightParen)?;
        Ok(Some(length))
    }

    fn read_precision_scale(&mut self) -> Result<DataType> {
        if !self.consume(&TokenKind::LeftParen) {
            return Ok(DataType::Decimal {
                precision: DEFAULT_DECIMAL_PRECISION,
                scale: 0,
            });
        }
        let precision = self.read_length()?;
        let scale = if self.consume(&TokenKind::Comma) {
            match self.current().kind {
                TokenKind::Integer(n) => {
                    let scale = u32::try_from(n).map_err(|_| self.unexpected("scale"))?;
                    self.advance();
                    scale
                }
                _ => return Err(self.unexpected("scale")),
            }
        } else {
            0
        };
        self.expect(&TokenKind::RightParen)?;
        if precision > MAX_DECIMAL_PRECISION || scale > precision {
            return Err(self.unexpected("precision and scale"));
        }
        Ok(DataType::Decimal { precision, scale })
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::parse_type_definition;
    use crate::types::DataType;

    #[test]
    fn test_integer_family() {
        assert_eq!(parse_type_definition("INT").unwrap(), DataType::Integer);
        assert_eq!(parse_type_definition("tinyint").unwrap(), DataType::TinyInt);
        assert_eq!(
            parse_type_definition("double precision").unwrap(),
            DataType::Double
        );
    }

    #[test]
    fn test_character_lengths() {
        assert_eq!(parse_type_definition("CHAR").unwrap(), DataType::Char(1));
        assert_eq!(
            parse_type_definition("CHARACTER VARYING(30)").unwrap(),
            DataType::Varchar(30)
        );
        assert!(parse_type_definition("VARCHAR(0)").is_err());
    }

    #[test]
    fn test_array_suffix() {
        assert_eq!(
            parse_type_definition("INTEGER ARRAY[10]").unwrap(),
            DataType::Array(Box::new(DataType::Integer))
        );
    }

    #[test]
    fn test_display_parses_back() {
        for text in ["DECIMAL(12,3)", "CHARACTER(4)", "VARBINARY(16)", "TIMESTAMP"] {
            assert_eq!(parse_type_definition(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_scale_above_precision() {
        assert!(parse_type_definition("DECIMAL(2,5)").is_err());
    }
}
