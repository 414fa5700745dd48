table! {
    drafts (storage_key) {
        storage_key -> Text,
        document -> Text,
        updated_at -> Text,
    }
}
