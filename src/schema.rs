table! {
    users (id) {
        id -> Varchar,
        email -> Varchar,
        username -> Varchar,
        pass -> Varchar,
        salt -> Varchar,
        role -> Varchar,
        created_by -> Nullable<Varchar>,
        profile_image -> Nullable<Bytea>,
        dark_mode -> Bool,
        created_at -> Timestamp,
    }
}

table! {
    posts (id) {
        id -> Int4,
        title -> Varchar,
        slug -> Varchar,
        content -> Text,
        excerpt -> Nullable<Text>,
        status -> Varchar,
        category_id -> Nullable<Int4>,
        author_id -> Varchar,
        thumbnail -> Nullable<Bytea>,
        reading_time -> Nullable<Int4>,
        published_at -> Nullable<Timestamp>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    categories (id) {
        id -> Int4,
        name -> Varchar,
        slug -> Varchar,
        color -> Varchar,
    }
}

table! {
    tags (id) {
        id -> Int4,
        name -> Varchar,
        slug -> Varchar,
    }
}

table! {
    post_tags (post_id, tag_id) {
        post_id -> Int4,
        tag_id -> Int4,
    }
}

table! {
    comments (id) {
        id -> Varchar,
        post_id -> Int4,
        user_id -> Varchar,
        parent_id -> Nullable<Varchar>,
        content -> Text,
        created_at -> Timestamp,
    }
}

table! {
    likes (user_id, post_id) {
        user_id -> Varchar,
        post_id -> Int4,
        created_at -> Timestamp,
    }
}

table! {
    post_analytics (id) {
        id -> Int4,
        post_id -> Int4,
        date -> Date,
        views_count -> Int4,
        likes_count -> Int4,
        comments_count -> Int4,
    }
}

table! {
    admin_audit_logs (id) {
        id -> Int4,
        admin_id -> Varchar,
        action -> Varchar,
        target_table -> Varchar,
        target_id -> Varchar,
        details -> Nullable<Text>,
        created_at -> Timestamp,
    }
}

table! {
    post_images (id) {
        id -> Int4,
        post_id -> Int4,
        data -> Bytea,
        position -> Int4,
    }
}

allow_tables_to_appear_in_same_query!(
    users,
    posts,
    categories,
    tags,
    post_tags,
    comments,
    likes,
    post_analytics,
    admin_audit_logs,
    post_images,
);
