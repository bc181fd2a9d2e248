//! Hand-built descriptors and messages shared by unit tests
//!
//! Mirrors what prost-reflect-build would generate for:
//!
//! ```proto
//! package helloworld;
//! message HelloRequest { string name = 1; }
//! message HelloReply { string message = 1; }
//!
//! package fixtures;
//! enum Mood { MOOD_UNSPECIFIED = 0; MOOD_HAPPY = 1; }
//! message Sample {
//!   string title = 1; int32 count = 2; bool enabled = 3; double ratio = 4;
//!   bytes payload = 5; Mood mood = 6; repeated string tags = 7;
//!   helloworld.HelloReply reply = 8; map<string, int32> labels = 9;
//!   string snake_case_field = 10;
//! }
//! message Counter { int32 message = 1; }
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;

use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, MapKey, MessageDescriptor, ReflectMessage, Value};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet, MessageOptions,
};

static POOL: LazyLock<DescriptorPool> = LazyLock::new(|| {
    let set = FileDescriptorSet {
        file: vec![helloworld_file(), fixtures_file()],
    };
    DescriptorPool::decode(set.encode_to_vec().as_slice()).expect("fixture descriptors are valid")
});

pub fn descriptor(name: &str) -> MessageDescriptor {
    POOL.get_message_by_name(name)
        .unwrap_or_else(|| panic!("{} is declared", name))
}

#[derive(Clone, PartialEq, Message)]
pub struct HelloReply {
    #[prost(string, tag = "1")]
    pub message: String,
}

impl HelloReply {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl ReflectMessage for HelloReply {
    fn descriptor(&self) -> MessageDescriptor {
        descriptor("helloworld.HelloReply")
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct HelloRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

impl HelloRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ReflectMessage for HelloRequest {
    fn descriptor(&self) -> MessageDescriptor {
        descriptor("helloworld.HelloRequest")
    }
}

/// Encodes `message` as a string but claims the `fixtures.Counter` descriptor,
/// where field 1 is an int32
#[derive(Clone, PartialEq, Message)]
pub struct Mismatched {
    #[prost(string, tag = "1")]
    pub message: String,
}

impl ReflectMessage for Mismatched {
    fn descriptor(&self) -> MessageDescriptor {
        descriptor("fixtures.Counter")
    }
}

pub fn sample() -> DynamicMessage {
    let mut reply = DynamicMessage::new(descriptor("helloworld.HelloReply"));
    reply.set_field_by_name("message", Value::String("nested".into()));

    let mut message = DynamicMessage::new(descriptor("fixtures.Sample"));
    message.set_field_by_name("title", Value::String("say \"hi\"\n".into()));
    message.set_field_by_name("count", Value::I32(7));
    message.set_field_by_name("enabled", Value::Bool(true));
    message.set_field_by_name("ratio", Value::F64(0.5));
    message.set_field_by_name(
        "payload",
        Value::Bytes(prost::bytes::Bytes::from_static(b"\x01ab")),
    );
    message.set_field_by_name("mood", Value::EnumNumber(1));
    message.set_field_by_name(
        "tags",
        Value::List(vec![Value::String("a".into()), Value::String("b".into())]),
    );
    message.set_field_by_name("reply", Value::Message(reply));
    message.set_field_by_name(
        "labels",
        Value::Map(HashMap::from([
            (MapKey::String("y".into()), Value::I32(2)),
            (MapKey::String("x".into()), Value::I32(1)),
        ])),
    );
    message.set_field_by_name("snake_case_field", Value::String("kept".into()));
    message
}

fn field(name: &str, number: i32, ty: Type, label: Label) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(ty as i32),
        ..Default::default()
    }
}

fn typed_field(name: &str, number: i32, ty: Type, label: Label, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(type_name.to_string()),
        ..field(name, number, ty, label)
    }
}

fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..Default::default()
    }
}

fn helloworld_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("helloworld.proto".to_string()),
        package: Some("helloworld".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![
            message("HelloRequest", vec![field("name", 1, Type::String, Label::Optional)]),
            message("HelloReply", vec![field("message", 1, Type::String, Label::Optional)]),
        ],
        ..Default::default()
    }
}

fn fixtures_file() -> FileDescriptorProto {
    let labels_entry = DescriptorProto {
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..message(
            "LabelsEntry",
            vec![
                field("key", 1, Type::String, Label::Optional),
                field("value", 2, Type::Int32, Label::Optional),
            ],
        )
    };

    let sample = DescriptorProto {
        nested_type: vec![labels_entry],
        ..message(
            "Sample",
            vec![
                field("title", 1, Type::String, Label::Optional),
                field("count", 2, Type::Int32, Label::Optional),
                field("enabled", 3, Type::Bool, Label::Optional),
                field("ratio", 4, Type::Double, Label::Optional),
                field("payload", 5, Type::Bytes, Label::Optional),
                typed_field("mood", 6, Type::Enum, Label::Optional, ".fixtures.Mood"),
                field("tags", 7, Type::String, Label::Repeated),
                typed_field("reply", 8, Type::Message, Label::Optional, ".helloworld.HelloReply"),
                typed_field("labels", 9, Type::Message, Label::Repeated, ".fixtures.Sample.LabelsEntry"),
                field("snake_case_field", 10, Type::String, Label::Optional),
            ],
        )
    };

    let mood = EnumDescriptorProto {
        name: Some("Mood".to_string()),
        value: vec![
            EnumValueDescriptorProto {
                name: Some("MOOD_UNSPECIFIED".to_string()),
                number: Some(0),
                ..Default::default()
            },
            EnumValueDescriptorProto {
                name: Some("MOOD_HAPPY".to_string()),
                number: Some(1),
                ..Default::default()
            },
        ],
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some("fixtures.proto".to_string()),
        package: Some("fixtures".to_string()),
        dependency: vec!["helloworld.proto".to_string()],
        syntax: Some("proto3".to_string()),
        message_type: vec![
            sample,
            message("Counter", vec![field("message", 1, Type::Int32, Label::Optional)]),
        ],
        enum_type: vec![mood],
        ..Default::default()
    }
}
