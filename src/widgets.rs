//! Built-in widget classes
//!
//! Each class is a static table of attributes and signals; a single
//! [`Widget`] type interprets the table through [`Reflectable`]. Every class
//! inherits the `QWidget` base attributes (`enabled`, `visible`, `toolTip`).
//!
//! Writes emit the channels listed in the attribute's `emits` column, and
//! only when the stored value actually changes.

use crate::object::{AttributeInfo, ChannelId, ReflectError, Reflectable, Value, ValueType, WriteOutcome};

/// Default value of an attribute, in a form usable in static tables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Init {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(&'static str),
}

impl Init {
    pub fn value(self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(b),
            Self::Int(i) => Value::Int(i),
            Self::Double(d) => Value::Double(d),
            Self::Str(s) => Value::String(s.to_string()),
        }
    }

    pub fn value_type(self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Double(_) => ValueType::Double,
            Self::Str(_) => ValueType::String,
        }
    }
}

/// A signal signature in a class table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sig {
    pub name: &'static str,
    pub argument: Option<ValueType>,
}

impl Sig {
    pub const fn new(name: &'static str, argument: Option<ValueType>) -> Self {
        Self { name, argument }
    }

    pub fn id(&self) -> ChannelId {
        ChannelId::new(self.name, self.argument)
    }
}

#[derive(Debug)]
pub struct AttrDef {
    pub name: &'static str,
    pub init: Init,
    pub writable: bool,
    /// Change channel the class declares for this attribute.
    pub notify: Option<Sig>,
    /// Channels emitted when the value changes.
    pub emits: &'static [Sig],
}

const fn rw(name: &'static str, init: Init, emits: &'static [Sig]) -> AttrDef {
    AttrDef {
        name,
        init,
        writable: true,
        notify: None,
        emits,
    }
}

const fn ro(name: &'static str, init: Init) -> AttrDef {
    AttrDef {
        name,
        init,
        writable: false,
        notify: None,
        emits: &[],
    }
}

const fn declared(name: &'static str, init: Init, notify: Sig, emits: &'static [Sig]) -> AttrDef {
    AttrDef {
        name,
        init,
        writable: true,
        notify: Some(notify),
        emits,
    }
}

#[derive(Debug)]
pub struct WidgetClass {
    pub name: &'static str,
    pub attributes: &'static [AttrDef],
    pub signals: &'static [Sig],
}

// ── Signals ────────────────────────────────────────────────────────────────

const TEXT_CHANGED: Sig = Sig::new("textChanged", Some(ValueType::String));
const TEXT_EDITED: Sig = Sig::new("textEdited", Some(ValueType::String));
const PLAIN_TEXT_CHANGED: Sig = Sig::new("textChanged", None);
const TOGGLED: Sig = Sig::new("toggled", Some(ValueType::Bool));
const STATE_CHANGED: Sig = Sig::new("stateChanged", Some(ValueType::Int));
const VALUE_CHANGED_INT: Sig = Sig::new("valueChanged", Some(ValueType::Int));
const VALUE_CHANGED_DOUBLE: Sig = Sig::new("valueChanged", Some(ValueType::Double));
const SLIDER_MOVED: Sig = Sig::new("sliderMoved", Some(ValueType::Int));
const CURRENT_INDEX_CHANGED: Sig = Sig::new("currentIndexChanged", Some(ValueType::Int));

// ── Classes ────────────────────────────────────────────────────────────────

const BASE_ATTRIBUTES: &[AttrDef] = &[
    rw("enabled", Init::Bool(true), &[]),
    rw("visible", Init::Bool(true), &[]),
    rw("toolTip", Init::Str(""), &[]),
];

pub static WIDGET: WidgetClass = WidgetClass {
    name: "QWidget",
    attributes: &[],
    signals: &[],
};

pub static LABEL: WidgetClass = WidgetClass {
    name: "QLabel",
    attributes: &[
        rw("text", Init::Str(""), &[]),
        rw("wordWrap", Init::Bool(false), &[]),
    ],
    signals: &[],
};

pub static LINE_EDIT: WidgetClass = WidgetClass {
    name: "QLineEdit",
    attributes: &[
        rw("text", Init::Str(""), &[TEXT_CHANGED]),
        rw("placeholderText", Init::Str(""), &[]),
        rw("readOnly", Init::Bool(false), &[]),
    ],
    signals: &[TEXT_CHANGED, TEXT_EDITED],
};

pub static PLAIN_TEXT_EDIT: WidgetClass = WidgetClass {
    name: "QPlainTextEdit",
    attributes: &[
        rw("plainText", Init::Str(""), &[PLAIN_TEXT_CHANGED]),
        rw("readOnly", Init::Bool(false), &[]),
    ],
    signals: &[PLAIN_TEXT_CHANGED],
};

pub static CHECK_BOX: WidgetClass = WidgetClass {
    name: "QCheckBox",
    attributes: &[
        rw("text", Init::Str(""), &[]),
        declared("checked", Init::Bool(false), TOGGLED, &[TOGGLED]),
        rw("checkState", Init::Int(0), &[STATE_CHANGED]),
    ],
    signals: &[TOGGLED, STATE_CHANGED],
};

pub static SPIN_BOX: WidgetClass = WidgetClass {
    name: "QSpinBox",
    attributes: &[
        rw("value", Init::Int(0), &[VALUE_CHANGED_INT]),
        rw("minimum", Init::Int(0), &[]),
        rw("maximum", Init::Int(99), &[]),
    ],
    signals: &[VALUE_CHANGED_INT],
};

pub static DOUBLE_SPIN_BOX: WidgetClass = WidgetClass {
    name: "QDoubleSpinBox",
    attributes: &[
        rw("value", Init::Double(0.0), &[VALUE_CHANGED_DOUBLE]),
        rw("minimum", Init::Double(0.0), &[]),
        rw("maximum", Init::Double(99.99), &[]),
    ],
    signals: &[VALUE_CHANGED_DOUBLE],
};

pub static SLIDER: WidgetClass = WidgetClass {
    name: "QSlider",
    attributes: &[
        rw("value", Init::Int(0), &[VALUE_CHANGED_INT]),
        rw("sliderPosition", Init::Int(0), &[SLIDER_MOVED]),
        rw("minimum", Init::Int(0), &[]),
        rw("maximum", Init::Int(99), &[]),
    ],
    signals: &[VALUE_CHANGED_INT, SLIDER_MOVED],
};

pub static COMBO_BOX: WidgetClass = WidgetClass {
    name: "QComboBox",
    attributes: &[
        declared(
            "currentIndex",
            Init::Int(-1),
            CURRENT_INDEX_CHANGED,
            &[CURRENT_INDEX_CHANGED],
        ),
        ro("currentText", Init::Str("")),
    ],
    signals: &[CURRENT_INDEX_CHANGED],
};

pub static PROGRESS_BAR: WidgetClass = WidgetClass {
    name: "QProgressBar",
    attributes: &[
        rw("value", Init::Int(0), &[VALUE_CHANGED_INT]),
        ro("text", Init::Str("")),
    ],
    signals: &[VALUE_CHANGED_INT],
};

static CLASSES: &[&WidgetClass] = &[
    &WIDGET,
    &LABEL,
    &LINE_EDIT,
    &PLAIN_TEXT_EDIT,
    &CHECK_BOX,
    &SPIN_BOX,
    &DOUBLE_SPIN_BOX,
    &SLIDER,
    &COMBO_BOX,
    &PROGRESS_BAR,
];

pub fn find_class(name: &str) -> Option<&'static WidgetClass> {
    CLASSES.iter().copied().find(|c| c.name == name)
}

pub fn class_names() -> impl Iterator<Item = &'static str> {
    CLASSES.iter().map(|c| c.name)
}

/// Instantiate a widget of the named class with default attribute values.
pub fn create(class_name: &str) -> Option<Box<dyn Reflectable>> {
    find_class(class_name).map(|class| Box::new(Widget::new(class)) as Box<dyn Reflectable>)
}

/// A widget instance backed by a class table.
#[derive(Debug, Clone)]
pub struct Widget {
    class: &'static WidgetClass,
    /// Base attributes first, then the class's own, in table order.
    values: Vec<Value>,
}

impl Widget {
    pub fn new(class: &'static WidgetClass) -> Self {
        let values = BASE_ATTRIBUTES
            .iter()
            .chain(class.attributes)
            .map(|def| def.init.value())
            .collect();
        Self { class, values }
    }

    pub fn class(&self) -> &'static WidgetClass {
        self.class
    }

    fn defs(&self) -> impl Iterator<Item = &'static AttrDef> {
        BASE_ATTRIBUTES.iter().chain(self.class.attributes)
    }

    fn position(&self, name: &str) -> Option<(usize, &'static AttrDef)> {
        self.defs().enumerate().find(|(_, d)| d.name == name)
    }
}

impl Reflectable for Widget {
    fn class_name(&self) -> &'static str {
        self.class.name
    }

    fn attributes(&self) -> Vec<AttributeInfo> {
        self.defs()
            .map(|def| AttributeInfo {
                name: def.name.to_string(),
                value_type: def.init.value_type(),
                readable: true,
                writable: def.writable,
                notify: def.notify.map(|s| s.id()),
            })
            .collect()
    }

    fn channels(&self) -> Vec<ChannelId> {
        self.class.signals.iter().map(Sig::id).collect()
    }

    fn get_attribute(&self, name: &str) -> Option<Value> {
        self.position(name).map(|(idx, _)| self.values[idx].clone())
    }

    fn set_attribute(&mut self, name: &str, value: Value) -> Result<WriteOutcome, ReflectError> {
        let (idx, def) = self
            .position(name)
            .ok_or_else(|| ReflectError::UnknownAttribute(name.to_string()))?;
        if !def.writable {
            return Err(ReflectError::ReadOnly(name.to_string()));
        }
        let expected = def.init.value_type();
        if value.value_type() != expected {
            return Err(ReflectError::TypeMismatch {
                attribute: name.to_string(),
                expected,
                actual: value.value_type(),
            });
        }
        if self.values[idx].same_as(&value) {
            return Ok(WriteOutcome::default());
        }
        self.values[idx] = value;
        Ok(WriteOutcome {
            changed: true,
            emitted: def.emits.iter().map(Sig::id).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_class_is_creatable() {
        for name in class_names() {
            let widget = create(name).unwrap();
            assert_eq!(widget.class_name(), name);
            assert_eq!(widget.get_attribute("enabled"), Some(Value::Bool(true)));
        }
        assert!(create("QTreeView").is_none());
    }

    #[test]
    fn test_emitted_channels_are_declared_signals() {
        for class in CLASSES {
            for def in class.attributes {
                for sig in def.emits.iter().chain(def.notify.iter()) {
                    assert!(
                        class.signals.contains(sig),
                        "{}.{} emits undeclared {}",
                        class.name,
                        def.name,
                        sig.name
                    );
                }
            }
        }
    }

    #[test]
    fn test_write_emits_only_on_change() {
        let mut edit = Widget::new(&LINE_EDIT);
        let outcome = edit.set_attribute("text", "abc".into()).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.emitted, vec![TEXT_CHANGED.id()]);

        let outcome = edit.set_attribute("text", "abc".into()).unwrap();
        assert_eq!(outcome, WriteOutcome::default());
    }

    #[test]
    fn test_rewriting_nan_is_not_a_change() {
        let mut spin = Widget::new(&DOUBLE_SPIN_BOX);
        assert!(spin.set_attribute("value", Value::Double(f64::NAN)).unwrap().changed);
        let outcome = spin.set_attribute("value", Value::Double(f64::NAN)).unwrap();
        assert_eq!(outcome, WriteOutcome::default());
    }

    #[test]
    fn test_write_rejections() {
        let mut combo = Widget::new(&COMBO_BOX);
        assert_eq!(
            combo.set_attribute("currentText", "x".into()),
            Err(ReflectError::ReadOnly("currentText".into()))
        );
        assert_eq!(
            combo.set_attribute("currentIndex", "1".into()),
            Err(ReflectError::TypeMismatch {
                attribute: "currentIndex".into(),
                expected: ValueType::Int,
                actual: ValueType::String,
            })
        );
        assert_eq!(
            combo.set_attribute("nope", Value::Int(1)),
            Err(ReflectError::UnknownAttribute("nope".into()))
        );
    }

    #[test]
    fn test_attribute_metadata() {
        let check = Widget::new(&CHECK_BOX);
        let checked = check.attribute("checked").unwrap();
        assert_eq!(checked.value_type, ValueType::Bool);
        assert_eq!(checked.notify, Some(TOGGLED.id()));
        assert!(checked.is_bindable());

        let label = Widget::new(&LABEL);
        let names: Vec<String> = label.attributes().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["enabled", "visible", "toolTip", "text", "wordWrap"]);
        assert!(label.channels().is_empty());
    }
}
