use super::object::{Heap, ObjHandle};

/// Runtime value. `Infinity` and `NaN` are first-class tags carrying a
/// sign (`true` is positive) so the host's floating-point behavior never
/// leaks into the language.
#[derive(Debug, Clone, Copy)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Double(f64),
    Infinity(bool),
    NaN(bool),
    Str(ObjHandle),
}

/// Retags non-finite results of host arithmetic. NaN defaults to the
/// negative sign, matching the language's `0 / 0` result.
fn from_f64(x: f64) -> Value {
    if x.is_nan() {
        Value::NaN(false)
    } else if x.is_infinite() {
        Value::Infinity(x > 0.0)
    } else {
        Value::Double(x)
    }
}

/// The special tag addition carries through: the left operand's wins,
/// then the right's.
fn propagated_special(a: Value, b: Value) -> Option<Value> {
    match a {
        Value::Infinity(_) | Value::NaN(_) => Some(a),
        _ => match b {
            Value::Infinity(_) | Value::NaN(_) => Some(b),
            _ => None,
        },
    }
}

impl Value {
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_str(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Value::Int(_) | Value::Double(_) | Value::Infinity(_) | Value::NaN(_)
        )
    }

    /// `None`, `false` and the empty string are falsey; everything else,
    /// including zero, is truthy.
    pub fn is_falsey(&self, heap: &Heap) -> bool {
        match self {
            Value::None => true,
            Value::Bool(b) => !b,
            Value::Str(h) => heap.get_str(*h).is_empty(),
            _ => false,
        }
    }

    /// Double projection of a numeric tag.
    fn project(&self) -> f64 {
        match self {
            Value::Int(x) => *x as f64,
            Value::Double(x) => *x,
            Value::Infinity(positive) => {
                if *positive {
                    f64::INFINITY
                } else {
                    f64::NEG_INFINITY
                }
            }
            Value::NaN(_) => f64::NAN,
            _ => unreachable!("projection of a non-number"),
        }
    }

    pub fn stringify(&self, heap: &Heap) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(x) => x.to_string(),
            Value::Double(x) => format!("{}", x),
            Value::Infinity(positive) => String::from(if *positive { "inf" } else { "-inf" }),
            Value::NaN(positive) => String::from(if *positive { "Nan" } else { "-Nan" }),
            Value::Str(h) => heap.get_str(*h).to_string(),
        }
    }

    //>> Operand checkers. The VM raises a runtime error when these fail;
    //>> combinations they admit always produce a value.
    pub fn are_addable(a: &Value, b: &Value) -> bool {
        a.is_none()
            || b.is_none()
            || a.is_str()
            || b.is_str()
            || (a.is_number() && b.is_number())
    }

    pub fn are_multipliable(a: &Value, b: &Value) -> bool {
        a.is_none()
            || b.is_none()
            || a.is_str()
            || b.is_str()
            || (a.is_number() && b.is_number())
    }

    pub fn are_numbers(a: &Value, b: &Value) -> bool {
        a.is_none() || b.is_none() || (a.is_number() && b.is_number())
    }
    //<<

    /// number + number, string + anything (display-form concatenation),
    /// None absorbs everything.
    pub fn add(self, other: Value, heap: &mut Heap) -> Value {
        if self.is_none() || other.is_none() {
            return Value::None;
        }
        if self.is_str() || other.is_str() {
            let content = format!("{}{}", self.stringify(heap), other.stringify(heap));
            return Value::Str(heap.intern(&content));
        }
        if let Some(special) = propagated_special(self, other) {
            return special;
        }
        match (self, other) {
            (Value::Int(x), Value::Int(y)) => Value::Int(x.wrapping_add(y)),
            _ => from_f64(self.project() + other.project()),
        }
    }

    pub fn multiply(self, other: Value, heap: &mut Heap) -> Value {
        if self.is_none() || other.is_none() {
            return Value::None;
        }
        match (self, other) {
            (Value::Str(h), Value::Int(n)) | (Value::Int(n), Value::Str(h)) => {
                let content = heap.get_str(h).repeat(n.max(0) as usize);
                return Value::Str(heap.intern(&content));
            }
            _ => {}
        }
        if self.is_str() || other.is_str() {
            return Value::None;
        }
        match (self, other) {
            (Value::Int(x), Value::Int(y)) => Value::Int(x.wrapping_mul(y)),
            // special tags project to +-infinity/NaN and retag on the way out
            _ => from_f64(self.project() * other.project()),
        }
    }

    /// Always yields a double. `0 / 0` is negative NaN; `x / 0` is
    /// infinity signed like the numerator.
    pub fn divide(self, other: Value) -> Value {
        if self.is_none() || other.is_none() {
            return Value::None;
        }
        let (x, y) = (self.project(), other.project());
        if y == 0.0 {
            if x == 0.0 || x.is_nan() {
                Value::NaN(false)
            } else {
                Value::Infinity(x > 0.0)
            }
        } else {
            from_f64(x / y)
        }
    }

    /// fmod on the double projection of both operands.
    pub fn modulo(self, other: Value) -> Value {
        if self.is_none() || other.is_none() {
            return Value::None;
        }
        from_f64(self.project() % other.project())
    }

    /// Comparisons are defined on numbers only; any string, none or bool
    /// operand makes the result `false`.
    pub fn greater(self, other: Value) -> Value {
        if !self.is_number() || !other.is_number() {
            return Value::Bool(false);
        }
        Value::Bool(self.project() > other.project())
    }

    pub fn less(self, other: Value) -> Value {
        if !self.is_number() || !other.is_number() {
            return Value::Bool(false);
        }
        Value::Bool(self.project() < other.project())
    }

    pub fn shift_left(self, other: Value) -> Value {
        if self.is_none() || other.is_none() {
            return Value::None;
        }
        match (self, other) {
            (Value::Int(x), Value::Int(y)) => Value::Int((x as u64).wrapping_shl(y as u32) as i64),
            _ => Value::None,
        }
    }

    pub fn shift_right(self, other: Value) -> Value {
        if self.is_none() || other.is_none() {
            return Value::None;
        }
        match (self, other) {
            (Value::Int(x), Value::Int(y)) => Value::Int((x as u64).wrapping_shr(y as u32) as i64),
            _ => Value::None,
        }
    }

    /// Sign flip. `None` means the operand is not negatable and the VM
    /// reports a runtime error.
    pub fn negate(self) -> Option<Value> {
        match self {
            Value::Int(x) => Some(Value::Int(x.wrapping_neg())),
            Value::Double(x) => Some(Value::Double(-x)),
            Value::Infinity(positive) => Some(Value::Infinity(!positive)),
            Value::NaN(positive) => Some(Value::NaN(!positive)),
            _ => None,
        }
    }

    /// Int and Double cross-compare through the double projection with an
    /// epsilon tolerance. NaN equals nothing, itself included. Interned
    /// strings compare by handle.
    pub fn equals(self, other: Value) -> bool {
        match (self, other) {
            (Value::NaN(_), _) | (_, Value::NaN(_)) => false,
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Int(x), Value::Double(y)) | (Value::Double(y), Value::Int(x)) => {
                (x as f64 - y).abs() < f64::EPSILON
            }
            (Value::Double(x), Value::Double(y)) => (x - y).abs() < f64::EPSILON,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::None, Value::None) => true,
            (Value::Infinity(x), Value::Infinity(y)) => x == y,
            (Value::Str(x), Value::Str(y)) => x == y,
            _ => false,
        }
    }
}
